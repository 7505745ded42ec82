//! RMA receipt processing: restocks returned units to QUARANTINE (spec
//! §9.9, grounded in
//! `original_source/wms_backend/inventory/services.py::process_return_receipt`).

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::models::{JournalAction, RmaStatus};

pub struct ReturnsService {
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReturnResult {
    pub status: RmaStatus,
    pub lines_restocked: usize,
}

const DEFAULT_RETURNS_DOCK: &str = "RETURNS-DOCK";

impl ReturnsService {
    pub fn new(pool: PgPool, events: Arc<dyn EventPublisher>) -> Self {
        Self { pool, events }
    }

    /// process_return_receipt(rma_id, loc?) — spec §4 RMA/RMALine, §8 S5.
    /// For each line, restocks `qty_to_return` into a QUARANTINE row at
    /// the returns dock (defaulting to `RETURNS-DOCK`), fails with
    /// `AlreadyProcessed` if the RMA is already RECEIVED.
    pub async fn process_return_receipt(
        &self,
        rma_id: Uuid,
        location_code: Option<&str>,
    ) -> Result<ProcessReturnResult> {
        let location_code = location_code.unwrap_or(DEFAULT_RETURNS_DOCK);

        let mut tx = self.pool.begin().await?;

        let status: Option<RmaStatus> = sqlx::query_scalar(
            "SELECT status FROM rmas WHERE id = $1 FOR UPDATE",
        )
        .bind(rma_id)
        .fetch_optional(&mut *tx)
        .await?;

        let status = status.ok_or_else(|| Error::UnknownEntity(format!("rma {rma_id}")))?;
        if status == RmaStatus::Received {
            return Err(Error::AlreadyProcessed(format!("rma {rma_id} already processed")));
        }

        let lines: Vec<(Uuid, Uuid, i64)> = sqlx::query_as(
            "SELECT id, item_id, qty_to_return FROM rma_lines WHERE rma_id = $1",
        )
        .bind(rma_id)
        .fetch_all(&mut *tx)
        .await?;

        for (line_id, item_id, qty_to_return) in &lines {
            if *qty_to_return <= 0 {
                continue;
            }

            let existing = sqlx::query_as::<_, crate::models::Inventory>(
                "SELECT * FROM inventory
                 WHERE item_id = $1 AND location_code = $2 AND lot_number IS NULL AND status = 'quarantine'
                 FOR UPDATE",
            )
            .bind(item_id)
            .bind(location_code)
            .fetch_optional(&mut *tx)
            .await?;

            match existing {
                Some(row) => {
                    sqlx::query(
                        "UPDATE inventory SET quantity = quantity + $1, version = version + 1, updated_at = now()
                         WHERE id = $2",
                    )
                    .bind(qty_to_return)
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO inventory
                         (id, item_id, location_code, lot_number, status, quantity, reserved_quantity,
                          expiry_date, is_on_hold, version, created_at, updated_at)
                         VALUES ($1, $2, $3, NULL, 'quarantine', $4, 0, NULL, false, 1, now(), now())",
                    )
                    .bind(Uuid::new_v4())
                    .bind(item_id)
                    .bind(location_code)
                    .bind(qty_to_return)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            sqlx::query("UPDATE rma_lines SET qty_received = $1 WHERE id = $2")
                .bind(qty_to_return)
                .bind(line_id)
                .execute(&mut *tx)
                .await?;

            let sku: String = sqlx::query_scalar("SELECT sku FROM items WHERE id = $1")
                .bind(item_id)
                .fetch_one(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO transaction_log
                 (id, timestamp, action, sku_snapshot, location_snapshot, quantity_change, lot_snapshot, actor)
                 VALUES ($1, now(), $2, $3, $4, $5, NULL, NULL)",
            )
            .bind(Uuid::new_v4())
            .bind(JournalAction::Receive)
            .bind(&sku)
            .bind(location_code)
            .bind(qty_to_return)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE rmas SET status = 'received', updated_at = now() WHERE id = $1")
            .bind(rma_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(rma_id = %rma_id, location_code, lines = lines.len(), "return receipt processed");
        self.events
            .publish(DomainEvent::new(
                "rma.received",
                serde_json::json!({"rma_id": rma_id, "location_code": location_code}),
            ))
            .await;

        Ok(ProcessReturnResult {
            status: RmaStatus::Received,
            lines_restocked: lines.len(),
        })
    }
}

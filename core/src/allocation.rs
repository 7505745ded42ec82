//! Reserves stock for a PENDING order against FEFO-ordered candidates
//! (spec §4.2).

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::models::{Inventory, Order, OrderLine, OrderStatus};

pub struct AllocationEngine {
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationResult {
    pub status: OrderStatus,
    pub lines: Vec<LineAllocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineAllocation {
    pub order_line_id: Uuid,
    pub qty_allocated: i64,
}

impl AllocationEngine {
    pub fn new(pool: PgPool, events: Arc<dyn EventPublisher>) -> Self {
        Self { pool, events }
    }

    /// allocate(order_id) — spec §4.2. Idempotent while the order remains
    /// PENDING: re-invoking continues from the current partial
    /// allocation. Fails with `InvalidState` once the order is ALLOCATED
    /// or further along.
    pub async fn allocate_order(&self, order_id: Uuid) -> Result<AllocationResult> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("order {order_id}")))?;

        if order.status != OrderStatus::Pending {
            return Err(Error::InvalidState(format!(
                "order {order_id} is {:?}, allocate requires PENDING",
                order.status
            )));
        }

        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut results = Vec::with_capacity(lines.len());
        let mut fully_allocated = true;

        for line in lines {
            let mut qty_needed = line.qty_needed();
            let mut qty_taken_total = 0i64;

            if qty_needed > 0 {
                let candidates = sqlx::query_as::<_, Inventory>(
                    "SELECT * FROM inventory
                     WHERE item_id = $1 AND status = 'available' AND is_on_hold = false
                       AND quantity > reserved_quantity
                     ORDER BY expiry_date ASC NULLS LAST, id ASC
                     FOR UPDATE",
                )
                .bind(line.item_id)
                .fetch_all(&mut *tx)
                .await?;

                for candidate in candidates {
                    if qty_needed <= 0 {
                        break;
                    }
                    let available = candidate.available_quantity();
                    if available <= 0 {
                        continue;
                    }
                    let take = available.min(qty_needed);

                    sqlx::query(
                        "UPDATE inventory SET reserved_quantity = reserved_quantity + $1,
                         version = version + 1, updated_at = now()
                         WHERE id = $2",
                    )
                    .bind(take)
                    .bind(candidate.id)
                    .execute(&mut *tx)
                    .await?;

                    qty_needed -= take;
                    qty_taken_total += take;
                }
            }

            let new_qty_allocated = line.qty_allocated + qty_taken_total;
            sqlx::query(
                "UPDATE order_lines SET qty_allocated = $1, updated_at = now() WHERE id = $2",
            )
            .bind(new_qty_allocated)
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

            if new_qty_allocated < line.qty_ordered {
                fully_allocated = false;
            }

            results.push(LineAllocation {
                order_line_id: line.id,
                qty_allocated: new_qty_allocated,
            });
        }

        let new_status = if fully_allocated {
            OrderStatus::Allocated
        } else {
            OrderStatus::Pending
        };

        sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
            .bind(new_status)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, status = ?new_status, "order allocation attempted");
        self.events
            .publish(DomainEvent::new(
                "order.allocated",
                serde_json::json!({"order_id": order_id, "status": format!("{:?}", new_status)}),
            ))
            .await;

        Ok(AllocationResult {
            status: new_status,
            lines: results,
        })
    }
}

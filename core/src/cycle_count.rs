//! Session/task creation and variance-driven adjustment (spec §4.4).

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::models::{CycleCountSessionStatus, CycleCountTaskStatus, JournalAction};

pub struct CycleCountEngine {
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCycleCountResult {
    pub session_id: Uuid,
    pub reference: String,
    pub task_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitCountResult {
    pub variance: i64,
    pub session_completed: bool,
}

impl CycleCountEngine {
    pub fn new(pool: PgPool, events: Arc<dyn EventPublisher>) -> Self {
        Self { pool, events }
    }

    /// create_random(aisle_prefix?, limit) — spec §4.4. Selects up to
    /// `limit` inventory rows with `quantity > 0` (optionally filtered by
    /// location prefix) uniformly at random without replacement.
    pub async fn create_random(
        &self,
        aisle_prefix: Option<&str>,
        limit: i64,
    ) -> Result<CreateCycleCountResult> {
        let mut tx = self.pool.begin().await?;

        let candidate_ids: Vec<Uuid> = match aisle_prefix {
            Some(prefix) => {
                sqlx::query_scalar(
                    "SELECT id FROM inventory WHERE quantity > 0 AND location_code LIKE $1",
                )
                .bind(format!("{prefix}%"))
                .fetch_all(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT id FROM inventory WHERE quantity > 0")
                    .fetch_all(&mut *tx)
                    .await?
            }
        };

        if candidate_ids.is_empty() {
            return Err(Error::Empty("no inventory rows to count".to_string()));
        }

        let mut rng = rand::thread_rng();
        let mut shuffled = candidate_ids;
        shuffled.shuffle(&mut rng);
        let take = (limit.max(0) as usize).min(shuffled.len());
        let selected = &shuffled[..take];

        let reference = format!("CC-{}", &Uuid::new_v4().to_string()[..8].to_uppercase());
        let session_id = Self::create_session(&mut tx, &reference, None).await?;
        let task_count = Self::create_tasks_for_rows(&mut tx, session_id, selected).await?;

        tx.commit().await?;

        info!(session = %session_id, reference, task_count, "random cycle count created");
        self.events
            .publish(DomainEvent::new(
                "cycle_count.created",
                serde_json::json!({"session_id": session_id, "reference": reference, "task_count": task_count}),
            ))
            .await;

        Ok(CreateCycleCountResult {
            session_id,
            reference,
            task_count,
        })
    }

    /// create_for_location(loc) — spec §4.4. All rows at `loc` with
    /// `quantity > 0`; fails with `Empty` if none.
    pub async fn create_for_location(&self, location_code: &str) -> Result<CreateCycleCountResult> {
        let mut tx = self.pool.begin().await?;

        let candidate_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM inventory WHERE location_code = $1 AND quantity > 0",
        )
        .bind(location_code)
        .fetch_all(&mut *tx)
        .await?;

        if candidate_ids.is_empty() {
            return Err(Error::Empty(format!(
                "location {location_code} has no countable inventory"
            )));
        }

        let reference = format!("CC-LOC-{location_code}-{}", &Uuid::new_v4().to_string()[..4].to_uppercase());
        let session_id = Self::create_session(&mut tx, &reference, Some("MANUAL_TRIGGER")).await?;
        let task_count = Self::create_tasks_for_rows(&mut tx, session_id, &candidate_ids).await?;

        tx.commit().await?;

        info!(session = %session_id, reference, location_code, task_count, "location cycle count created");
        self.events
            .publish(DomainEvent::new(
                "cycle_count.created",
                serde_json::json!({"session_id": session_id, "reference": reference, "task_count": task_count}),
            ))
            .await;

        Ok(CreateCycleCountResult {
            session_id,
            reference,
            task_count,
        })
    }

    async fn create_session(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reference: &str,
        device_id: Option<&str>,
    ) -> Result<Uuid> {
        let session_id: Uuid = sqlx::query_scalar(
            "INSERT INTO cycle_count_sessions (id, reference, status, device_id, created_at, updated_at)
             VALUES ($1, $2, 'in_progress', $3, now(), now()) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(reference)
        .bind(device_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(session_id)
    }

    async fn create_tasks_for_rows(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
        inventory_ids: &[Uuid],
    ) -> Result<usize> {
        for id in inventory_ids {
            let expected_qty: i64 = sqlx::query_scalar("SELECT quantity FROM inventory WHERE id = $1")
                .bind(id)
                .fetch_one(&mut **tx)
                .await?;

            sqlx::query(
                "INSERT INTO cycle_count_tasks
                 (id, session_id, inventory_id, expected_qty, counted_qty, variance, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, NULL, NULL, 'pending', now(), now())",
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(id)
            .bind(expected_qty)
            .execute(&mut **tx)
            .await?;
        }
        Ok(inventory_ids.len())
    }

    /// submit_count(task_id, counted_qty) — spec §4.4. Compares against
    /// **live** quantity (not the task's `expected_qty` snapshot) so
    /// concurrent legitimate picks aren't mistaken for shrinkage.
    pub async fn submit_count(&self, task_id: Uuid, counted_qty: i64) -> Result<SubmitCountResult> {
        let mut tx = self.pool.begin().await?;

        let task_status: Option<(CycleCountTaskStatus, Uuid, Uuid)> = sqlx::query_as(
            "SELECT status, inventory_id, session_id FROM cycle_count_tasks WHERE id = $1 FOR UPDATE",
        )
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (status, inventory_id, session_id) =
            task_status.ok_or_else(|| Error::UnknownEntity(format!("cycle count task {task_id}")))?;

        if status != CycleCountTaskStatus::Pending {
            return Err(Error::AlreadyProcessed(format!(
                "task {task_id} is already COUNTED"
            )));
        }

        let (live_qty, item_id, location_code): (i64, Uuid, String) = sqlx::query_as(
            "SELECT quantity, item_id, location_code FROM inventory WHERE id = $1 FOR UPDATE",
        )
        .bind(inventory_id)
        .fetch_one(&mut *tx)
        .await?;

        let variance = counted_qty - live_qty;

        sqlx::query(
            "UPDATE cycle_count_tasks SET counted_qty = $1, variance = $2, status = 'counted', updated_at = now()
             WHERE id = $3",
        )
        .bind(counted_qty)
        .bind(variance)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        if variance != 0 {
            sqlx::query(
                "UPDATE inventory SET quantity = $1, version = version + 1, updated_at = now() WHERE id = $2",
            )
            .bind(counted_qty)
            .bind(inventory_id)
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
            .bind(JournalAction::Adjust)
            .bind(&sku)
            .bind(&location_code)
            .bind(variance)
            .execute(&mut *tx)
            .await?;

            warn!(task_id = %task_id, inventory_id = %inventory_id, variance, "cycle count variance recorded");
        }

        let remaining_pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cycle_count_tasks WHERE session_id = $1 AND status = 'pending'",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let session_completed = remaining_pending == 0;
        if session_completed {
            sqlx::query(
                "UPDATE cycle_count_sessions SET status = 'completed', updated_at = now() WHERE id = $1 AND status != 'completed'",
            )
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        }

        let session_status: CycleCountSessionStatus =
            sqlx::query_scalar("SELECT status FROM cycle_count_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        info!(task_id = %task_id, variance, "cycle count submitted");
        self.events
            .publish(DomainEvent::new(
                "cycle_count.submitted",
                serde_json::json!({"task_id": task_id, "variance": variance}),
            ))
            .await;

        Ok(SubmitCountResult {
            variance,
            session_completed: session_status == CycleCountSessionStatus::Completed,
        })
    }
}

//! Min/max-triggered moves from reserve stock to pick-face locations
//! (spec §4.5).

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::inventory_store::InventoryStore;
use crate::models::ReplenishmentStatus;

pub struct ReplenishmentPlanner {
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReplenishmentResult {
    pub created: usize,
}

struct PickFaceConfig {
    item_id: Uuid,
    location_code: String,
    min_qty: i64,
    max_qty: i64,
}

impl ReplenishmentPlanner {
    pub fn new(pool: PgPool, events: Arc<dyn EventPublisher>) -> Self {
        Self { pool, events }
    }

    /// generate_replenishment_tasks() — spec §4.5. For each pick-face
    /// `LocationConfiguration` under its `min_qty`, creates a task moving
    /// from the largest matching reserve row, deduplicated by
    /// `(item, dest, PENDING)` so repeated invocations don't flap.
    pub async fn generate_replenishment_tasks(&self) -> Result<GenerateReplenishmentResult> {
        let mut tx = self.pool.begin().await?;

        let configs = sqlx::query_as::<_, (Uuid, String, i64, i64)>(
            "SELECT item_id, location_code, min_qty, max_qty
             FROM location_configurations
             WHERE is_pick_face = true AND item_id IS NOT NULL",
        )
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(item_id, location_code, min_qty, max_qty)| PickFaceConfig {
            item_id,
            location_code,
            min_qty,
            max_qty,
        })
        .collect::<Vec<_>>();

        let mut created = 0usize;

        for config in configs {
            let current: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(quantity), 0) FROM inventory
                 WHERE item_id = $1 AND location_code = $2 AND status = 'available'",
            )
            .bind(config.item_id)
            .bind(&config.location_code)
            .fetch_one(&mut *tx)
            .await?;

            if current >= config.min_qty {
                continue;
            }

            let reserve: Option<(String, i64)> = sqlx::query_as(
                "SELECT location_code, quantity FROM inventory
                 WHERE item_id = $1 AND status = 'available' AND quantity > 0
                   AND location_code != $2
                 ORDER BY quantity DESC
                 LIMIT 1",
            )
            .bind(config.item_id)
            .bind(&config.location_code)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((reserve_location, reserve_qty)) = reserve else {
                continue;
            };

            let already_pending: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM replenishment_tasks
                 WHERE item_id = $1 AND dest_location = $2 AND status = 'pending')",
            )
            .bind(config.item_id)
            .bind(&config.location_code)
            .fetch_one(&mut *tx)
            .await?;

            if already_pending {
                continue;
            }

            let qty_to_move = (config.max_qty - current).min(reserve_qty);
            if qty_to_move <= 0 {
                continue;
            }

            sqlx::query(
                "INSERT INTO replenishment_tasks
                 (id, item_id, source_location, dest_location, qty_to_move, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, 'pending', now(), now())",
            )
            .bind(Uuid::new_v4())
            .bind(config.item_id)
            .bind(&reserve_location)
            .bind(&config.location_code)
            .bind(qty_to_move)
            .execute(&mut *tx)
            .await?;

            created += 1;
        }

        tx.commit().await?;

        info!(created, "replenishment tasks generated");
        if created > 0 {
            self.events
                .publish(DomainEvent::new(
                    "replenishment.generated",
                    serde_json::json!({"created": created}),
                ))
                .await;
        }

        Ok(GenerateReplenishmentResult { created })
    }

    /// complete_replenishment(task) — spec §4.5. Invokes the inventory
    /// store's `move` and marks the task COMPLETED on success, all inside
    /// one transaction so the task's row lock spans the physical move.
    pub async fn complete_replenishment(&self, task_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let task: Option<(Uuid, String, String, i64, ReplenishmentStatus)> = sqlx::query_as(
            "SELECT item_id, source_location, dest_location, qty_to_move, status
             FROM replenishment_tasks WHERE id = $1 FOR UPDATE",
        )
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (item_id, source_location, dest_location, qty_to_move, status) =
            task.ok_or_else(|| Error::UnknownEntity(format!("replenishment task {task_id}")))?;

        if status == ReplenishmentStatus::Completed {
            return Err(Error::AlreadyProcessed(format!(
                "replenishment task {task_id} already completed"
            )));
        }

        let sku: String = sqlx::query_scalar("SELECT sku FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_one(&mut *tx)
            .await?;

        InventoryStore::move_in_tx(&mut tx, &sku, &source_location, &dest_location, qty_to_move, None).await?;

        sqlx::query(
            "UPDATE replenishment_tasks SET status = 'completed', updated_at = now() WHERE id = $1",
        )
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(task_id = %task_id, sku, qty_to_move, "replenishment completed");
        self.events
            .publish(DomainEvent::new(
                "replenishment.completed",
                serde_json::json!({"task_id": task_id, "sku": sku, "qty_to_move": qty_to_move}),
            ))
            .await;

        Ok(())
    }
}

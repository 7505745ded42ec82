//! Periodic velocity-based tiering (spec §4.7).

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::Result;

use crate::models::AbcClass;

pub struct AbcClassifier {
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifyResult {
    pub class_a: usize,
    pub class_b: usize,
    pub class_c: usize,
}

impl AbcClassifier {
    pub fn new(pool: PgPool, events: Arc<dyn EventPublisher>) -> Self {
        Self { pool, events }
    }

    /// classify() — spec §4.7. Aggregates outbound velocity per SKU over a
    /// rolling 30-day window (sum of `-quantity_change` for
    /// PICK/PACK/SHIP journal entries), sorts descending, and assigns
    /// class A to the top 20%, B to the next 30%, C to the remainder.
    pub async fn classify(&self) -> Result<ClassifyResult> {
        let window_start = Utc::now() - Duration::days(30);

        let rows = sqlx::query_as::<_, (uuid::Uuid, i64)>(
            "SELECT i.id, COALESCE(SUM(-t.quantity_change), 0) AS velocity
             FROM items i
             LEFT JOIN transaction_log t
               ON t.sku_snapshot = i.sku
              AND t.action IN ('pick', 'pack', 'ship')
              AND t.timestamp >= $1
             GROUP BY i.id
             ORDER BY velocity DESC, i.id ASC",
        )
        .bind(window_start)
        .fetch_all(&self.pool)
        .await?;

        let total = rows.len();
        if total == 0 {
            return Ok(ClassifyResult::default());
        }

        let a_cutoff = ((total as f64) * 0.2).ceil() as usize;
        let b_cutoff = a_cutoff + ((total as f64) * 0.3).ceil() as usize;

        let mut result = ClassifyResult::default();
        let mut tx = self.pool.begin().await?;

        for (idx, (item_id, _velocity)) in rows.iter().enumerate() {
            let class = if idx < a_cutoff {
                result.class_a += 1;
                AbcClass::A
            } else if idx < b_cutoff {
                result.class_b += 1;
                AbcClass::B
            } else {
                result.class_c += 1;
                AbcClass::C
            };

            sqlx::query("UPDATE items SET abc_class = $1, updated_at = now() WHERE id = $2")
                .bind(class)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            class_a = result.class_a,
            class_b = result.class_b,
            class_c = result.class_c,
            "abc classification complete"
        );
        self.events
            .publish(DomainEvent::new(
                "abc_classifier.classified",
                serde_json::json!({
                    "class_a": result.class_a,
                    "class_b": result.class_b,
                    "class_c": result.class_c,
                }),
            ))
            .await;

        Ok(result)
    }
}

//! Aggregates multi-order picks and approximates a walk path (spec §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::order_pipeline::{OrderPipeline, OrderStatusResult};
use crate::models::{ClusterDistribution, ClusterTask, Inventory, Order, OrderLine, OrderStatus, SkuDemand, WaveLine};

pub struct WavePicker {
    pool: PgPool,
    order_pipeline: Arc<OrderPipeline>,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WavePlanResult {
    pub pick_list: Vec<WaveLine>,
    pub order_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteWaveResult {
    pub results: Vec<String>,
}

impl WavePicker {
    pub fn new(pool: PgPool, order_pipeline: Arc<OrderPipeline>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            pool,
            order_pipeline,
            events,
        }
    }

    async fn demand_for_orders(&self, order_ids: &[Uuid]) -> Result<(Vec<Order>, Vec<SkuDemand>)> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = ANY($1) AND status = 'allocated' AND is_on_hold = false
             ORDER BY priority DESC, created_at ASC",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_item: HashMap<Uuid, SkuDemand> = HashMap::new();

        for order in &orders {
            let lines = sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = $1")
                .bind(order.id)
                .fetch_all(&self.pool)
                .await?;

            for line in lines {
                let sku: String = sqlx::query_scalar("SELECT sku FROM items WHERE id = $1")
                    .bind(line.item_id)
                    .fetch_one(&self.pool)
                    .await?;

                let entry = by_item.entry(line.item_id).or_insert_with(|| SkuDemand {
                    item_id: line.item_id,
                    sku: sku.clone(),
                    total_qty: 0,
                    order_ids: Vec::new(),
                });
                entry.total_qty += line.qty_allocated;
                entry.order_ids.push(order.id);
            }
        }

        Ok((orders, by_item.into_values().collect()))
    }

    /// wave_plan(order_ids) — spec §4.6. Filters to ALLOCATED and not
    /// on-hold orders, orders by `(priority DESC, created_at ASC)`,
    /// aggregates demand per SKU, resolves a representative pick location,
    /// and sorts the result by `(x, y)` to approximate a serpentine walk.
    pub async fn wave_plan(&self, order_ids: &[Uuid]) -> Result<WavePlanResult> {
        let (orders, demand) = self.demand_for_orders(order_ids).await?;

        if orders.is_empty() {
            return Err(Error::Empty("no ALLOCATED orders found for these ids".to_string()));
        }

        let mut pick_list = Vec::with_capacity(demand.len());
        for d in demand {
            let row: Option<(String, i32, i32)> = sqlx::query_as(
                "SELECT i.location_code, l.x, l.y
                 FROM inventory i
                 JOIN locations l ON l.location_code = i.location_code
                 WHERE i.item_id = $1 AND i.status = 'available' AND i.quantity > 0
                 ORDER BY i.id ASC
                 LIMIT 1",
            )
            .bind(d.item_id)
            .fetch_optional(&self.pool)
            .await?;

            let (location_code, x, y) = row.unwrap_or_else(|| ("UNKNOWN".to_string(), 0, 0));

            pick_list.push(WaveLine {
                item_id: d.item_id,
                sku: d.sku,
                total_qty: d.total_qty,
                order_ids: d.order_ids,
                location_code,
                x,
                y,
            });
        }

        pick_list.sort_by_key(|l| (l.x, l.y));

        info!(order_count = orders.len(), lines = pick_list.len(), "wave plan computed");

        Ok(WavePlanResult {
            order_count: orders.len(),
            pick_list,
        })
    }

    /// create_cluster_batch(order_ids, picker) — spec §4.6. Validates every
    /// order is ALLOCATED and not already batched; fails atomically if any
    /// order is ineligible.
    pub async fn create_cluster_batch(&self, order_ids: &[Uuid], picker: &str) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ANY($1) FOR UPDATE")
            .bind(order_ids)
            .fetch_all(&mut *tx)
            .await?;

        if orders.len() != order_ids.len() {
            return Err(Error::UnknownEntity("one or more order ids not found".to_string()));
        }

        for order in &orders {
            if order.status != OrderStatus::Allocated {
                return Err(Error::InvalidState(format!(
                    "order {} is {:?}, cluster batch requires ALLOCATED",
                    order.id, order.status
                )));
            }
            if order.batch_id.is_some() {
                return Err(Error::InvalidState(format!(
                    "order {} is already part of a batch",
                    order.id
                )));
            }
        }

        let batch_id = Uuid::new_v4();
        sqlx::query("INSERT INTO pick_batches (id, picker, created_at) VALUES ($1, $2, now())")
            .bind(batch_id)
            .bind(picker)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE orders SET batch_id = $1, updated_at = now() WHERE id = ANY($2)")
            .bind(batch_id)
            .bind(order_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(batch_id = %batch_id, picker, order_count = order_ids.len(), "cluster batch created");
        self.events
            .publish(DomainEvent::new(
                "wave.cluster_batch_created",
                serde_json::json!({"batch_id": batch_id, "picker": picker, "order_ids": order_ids}),
            ))
            .await;

        Ok(batch_id)
    }

    /// get_cluster_tasks(batch) — spec §4.6. Computes aggregate SKU demand
    /// across the batch, resolves physical bins FEFO, and splits each
    /// bin's take across contributing order lines in encounter order.
    pub async fn get_cluster_tasks(&self, batch_id: Uuid) -> Result<Vec<ClusterTask>> {
        let order_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?;

        if order_ids.is_empty() {
            return Err(Error::UnknownEntity(format!("no orders for batch {batch_id}")));
        }

        // Per-SKU list of (order_id, order_line_id, qty_remaining) in
        // encounter order, used to distribute each bin's take first-come.
        let mut demand_lines: HashMap<Uuid, Vec<(Uuid, Uuid, i64)>> = HashMap::new();
        let mut skus: HashMap<Uuid, String> = HashMap::new();

        for order_id in &order_ids {
            let lines = sqlx::query_as::<_, OrderLine>(
                "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id",
            )
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

            for line in lines {
                if line.qty_allocated <= 0 {
                    continue;
                }
                let sku: String = sqlx::query_scalar("SELECT sku FROM items WHERE id = $1")
                    .bind(line.item_id)
                    .fetch_one(&self.pool)
                    .await?;
                skus.entry(line.item_id).or_insert(sku);
                demand_lines
                    .entry(line.item_id)
                    .or_default()
                    .push((*order_id, line.id, line.qty_allocated));
            }
        }

        let mut tasks = Vec::new();

        for (item_id, mut lines) in demand_lines {
            let bins = sqlx::query_as::<_, Inventory>(
                "SELECT * FROM inventory
                 WHERE item_id = $1 AND status = 'available' AND quantity > 0
                 ORDER BY expiry_date ASC NULLS LAST, id ASC",
            )
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;

            let sku = skus.get(&item_id).cloned().unwrap_or_default();

            for bin in bins {
                if lines.is_empty() {
                    break;
                }
                let mut bin_remaining = bin.quantity;
                let mut distribute_to = Vec::new();

                while bin_remaining > 0 {
                    let Some((order_id, line_id, remaining)) = lines.first_mut() else {
                        break;
                    };
                    let take = (*remaining).min(bin_remaining);
                    if take <= 0 {
                        lines.remove(0);
                        continue;
                    }
                    distribute_to.push(ClusterDistribution {
                        order_id: *order_id,
                        order_line_id: *line_id,
                        qty: take,
                    });
                    *remaining -= take;
                    bin_remaining -= take;
                    if *remaining == 0 {
                        lines.remove(0);
                    }
                }

                if !distribute_to.is_empty() {
                    let total_qty = distribute_to.iter().map(|d| d.qty).sum();
                    tasks.push(ClusterTask {
                        location_code: bin.location_code.clone(),
                        sku: sku.clone(),
                        total_qty,
                        distribute_to,
                    });
                }
            }
        }

        tasks.sort_by(|a, b| a.location_code.cmp(&b.location_code));

        Ok(tasks)
    }

    /// complete_wave(order_ids) — spec §4.6. Convenience bulk-pick assuming
    /// perfect execution: picks the first AVAILABLE bin for the full
    /// allocated qty of each line.
    pub async fn complete_wave(&self, order_ids: &[Uuid]) -> Result<CompleteWaveResult> {
        let mut results = Vec::with_capacity(order_ids.len());

        for order_id in order_ids {
            let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

            let Some(order) = order else {
                results.push(format!("error picking {order_id}: order not found"));
                continue;
            };

            let lines = sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = $1")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await?;

            let mut failed = false;
            for line in lines {
                if line.qty_picked >= line.qty_allocated {
                    continue;
                }
                let sku: String = sqlx::query_scalar("SELECT sku FROM items WHERE id = $1")
                    .bind(line.item_id)
                    .fetch_one(&self.pool)
                    .await?;

                let bin: Option<String> = sqlx::query_scalar(
                    "SELECT location_code FROM inventory
                     WHERE item_id = $1 AND status = 'available' AND quantity > 0
                     ORDER BY expiry_date ASC NULLS LAST, id ASC LIMIT 1",
                )
                .bind(line.item_id)
                .fetch_optional(&self.pool)
                .await?;

                let Some(location_code) = bin else {
                    results.push(format!("error picking {}: no stock for {sku}", order.order_number));
                    failed = true;
                    break;
                };

                let qty = line.qty_allocated - line.qty_picked;
                let outcome: Result<OrderStatusResult> = self
                    .order_pipeline
                    .pick_order_item(*order_id, &sku, &location_code, qty, None, None)
                    .await;

                if let Err(e) = outcome {
                    results.push(format!("error picking {}: {e}", order.order_number));
                    failed = true;
                    break;
                }
            }

            if !failed {
                results.push(format!("picked {}", order.order_number));
            }
        }

        Ok(CompleteWaveResult { results })
    }
}

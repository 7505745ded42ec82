use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cluster pick batch binding a set of orders to one picker (spec §4.6
/// `create_cluster_batch`/`get_cluster_tasks`). The spec names the
/// operations but not this aggregate explicitly — it's implied by
/// `Order.batch_id` and is carried here so batches persist between the
/// create and complete calls.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PickBatch {
    pub id: Uuid,
    pub picker: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated per-SKU demand for a wave or cluster batch, computed
/// in-memory from the open order lines it covers (spec §4.6). Not
/// persisted — recomputed on each `wave_plan`/`get_cluster_tasks` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuDemand {
    pub item_id: Uuid,
    pub sku: String,
    pub total_qty: i64,
    pub order_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveLine {
    pub item_id: Uuid,
    pub sku: String,
    pub total_qty: i64,
    pub order_ids: Vec<Uuid>,
    pub location_code: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDistribution {
    pub order_id: Uuid,
    pub order_line_id: Uuid,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTask {
    pub location_code: String,
    pub sku: String,
    pub total_qty: i64,
    pub distribute_to: Vec<ClusterDistribution>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Binds an item to a pick-face location with min/max thresholds (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocationConfiguration {
    pub id: Uuid,
    pub location_code: String,
    pub is_pick_face: bool,
    pub item_id: Option<Uuid>,
    pub min_qty: i64,
    pub max_qty: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "replenishment_status", rename_all = "snake_case")]
pub enum ReplenishmentStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReplenishmentTask {
    pub id: Uuid,
    pub item_id: Uuid,
    pub source_location: String,
    pub dest_location: String,
    pub qty_to_move: i64,
    pub status: ReplenishmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

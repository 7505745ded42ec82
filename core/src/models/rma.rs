use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "rma_status", rename_all = "snake_case")]
pub enum RmaStatus {
    Requested,
    Approved,
    Received,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rma {
    pub id: Uuid,
    pub rma_number: String,
    pub order_id: Uuid,
    pub status: RmaStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RmaLine {
    pub id: Uuid,
    pub rma_id: Uuid,
    pub item_id: Uuid,
    pub qty_to_return: i64,
    pub qty_received: i64,
}

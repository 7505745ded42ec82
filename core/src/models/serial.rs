use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "serial_status", rename_all = "snake_case")]
pub enum SerialStatus {
    InStock,
    Packed,
    Shipped,
    Returned,
}

/// Per-unit tracking row for serialized items (spec §3 SerialNumber).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SerialNumber {
    pub id: Uuid,
    pub serial: String,
    pub item_id: Uuid,
    pub location_code: Option<String>,
    pub inventory_id: Option<Uuid>,
    pub status: SerialStatus,
    pub allocated_order_line_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

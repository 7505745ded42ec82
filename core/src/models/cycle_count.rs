use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "cycle_count_session_status", rename_all = "snake_case")]
pub enum CycleCountSessionStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "cycle_count_task_status", rename_all = "snake_case")]
pub enum CycleCountTaskStatus {
    Pending,
    Counted,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CycleCountSession {
    pub id: Uuid,
    pub reference: String,
    pub status: CycleCountSessionStatus,
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Prefix used for the system-generated sessions `short_pick` files
/// shortage discrepancies under (spec §4.3, scenario S4).
pub const SYSTEM_SHORT_PICK_SESSION_PREFIX: &str = "SYS-ERR";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CycleCountTask {
    pub id: Uuid,
    pub session_id: Uuid,
    pub inventory_id: Uuid,
    pub expected_qty: i64,
    pub counted_qty: Option<i64>,
    pub variance: Option<i64>,
    pub status: CycleCountTaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

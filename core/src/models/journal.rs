use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "journal_action", rename_all = "snake_case")]
pub enum JournalAction {
    Receive,
    Pick,
    Adjust,
    Pack,
    Ship,
    Move,
}

/// A single append-only journal record (spec §3, §4.8). Never updated or
/// deleted after insertion — there is no repository method to do either.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JournalEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: JournalAction,
    pub sku_snapshot: String,
    pub location_snapshot: String,
    pub quantity_change: i64,
    pub lot_snapshot: Option<String>,
    pub actor: Option<String>,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "inventory_status", rename_all = "snake_case")]
pub enum InventoryStatus {
    Available,
    Quarantine,
    Damaged,
}

/// A stock row, keyed by `(item_id, location_code, lot_number, status)`
/// (spec §3, enforced by a unique constraint in the schema).
///
/// Invariants this row must satisfy after every committed transaction:
/// `quantity >= reserved_quantity >= 0`, and `version` strictly increases
/// on every update (spec §3 Inventory invariants 1-2).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Inventory {
    pub id: Uuid,
    pub item_id: Uuid,
    pub location_code: String,
    pub lot_number: Option<String>,
    pub status: InventoryStatus,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub is_on_hold: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    /// Quantity available to satisfy new allocations.
    pub fn available_quantity(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }
}

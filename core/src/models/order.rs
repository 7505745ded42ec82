use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Allocated,
    Picked,
    Packed,
    Shipped,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }
}

/// Order aggregate root (spec §3). The customer fields are a snapshot
/// taken at order creation, not a live reference into a customer table —
/// the core does not own customer identity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    pub status: OrderStatus,
    pub is_on_hold: bool,
    pub priority: i32,
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item of an [`Order`] (spec §3 OrderLine).
///
/// Invariant: `0 <= qty_picked <= qty_allocated <= qty_ordered`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub qty_ordered: i64,
    pub qty_allocated: i64,
    pub qty_picked: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderLine {
    pub fn qty_needed(&self) -> i64 {
        self.qty_ordered - self.qty_allocated
    }
}

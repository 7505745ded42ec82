use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "purchase_order_status", rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Ordered,
    Received,
}

/// One line of a [`PurchaseOrder`]'s embedded line list (spec §9: a value
/// object replaced atomically, never mutated in place, to avoid torn
/// writes on the JSON column).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoLine {
    pub sku: String,
    pub qty: i64,
    pub received: i64,
}

/// Purchase order. `lines` is stored as a JSON column (spec §3, §9) and
/// replaced wholesale on each receipt rather than patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub supplier: String,
    pub status: PurchaseOrderStatus,
    pub lines: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn parsed_lines(&self) -> serde_json::Result<Vec<PoLine>> {
        serde_json::from_value(self.lines.clone())
    }

    /// Derives status from line sums (spec §3 PurchaseOrder status rule).
    ///
    /// When nothing has been received yet, the status is whatever the
    /// caller explicitly set it to (DRAFT or ORDERED) — the line sums
    /// alone can't distinguish "not yet submitted" from "submitted, not
    /// yet received", so `current` is preserved in that case.
    pub fn derive_status(lines: &[PoLine], current: PurchaseOrderStatus) -> PurchaseOrderStatus {
        let ordered: i64 = lines.iter().map(|l| l.qty).sum();
        let received: i64 = lines.iter().map(|l| l.received).sum();
        if ordered > 0 && received >= ordered {
            PurchaseOrderStatus::Received
        } else if received > 0 {
            PurchaseOrderStatus::Ordered
        } else {
            current
        }
    }
}

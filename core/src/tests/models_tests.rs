//! Pure-logic unit tests needing no database.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    Inventory, InventoryStatus, OrderLine, OrderStatus, PoLine, PurchaseOrder, PurchaseOrderStatus,
};

fn blank_inventory(quantity: i64, reserved_quantity: i64) -> Inventory {
    let now = Utc::now();
    Inventory {
        id: Uuid::new_v4(),
        item_id: Uuid::new_v4(),
        location_code: "A-01".to_string(),
        lot_number: None,
        status: InventoryStatus::Available,
        quantity,
        reserved_quantity,
        expiry_date: None,
        is_on_hold: false,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn blank_order_line(qty_ordered: i64, qty_allocated: i64, qty_picked: i64) -> OrderLine {
    let now = Utc::now();
    OrderLine {
        id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        item_id: Uuid::new_v4(),
        qty_ordered,
        qty_allocated,
        qty_picked,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn available_quantity_subtracts_reserved() {
    let row = blank_inventory(10, 4);
    assert_eq!(row.available_quantity(), 6);
}

#[test]
fn qty_needed_is_ordered_minus_allocated() {
    let line = blank_order_line(10, 3, 0);
    assert_eq!(line.qty_needed(), 7);
}

#[test]
fn qty_needed_is_zero_once_fully_allocated() {
    let line = blank_order_line(10, 10, 2);
    assert_eq!(line.qty_needed(), 0);
}

#[test]
fn order_status_only_shipped_is_terminal() {
    assert!(!OrderStatus::Pending.is_terminal());
    assert!(!OrderStatus::Allocated.is_terminal());
    assert!(!OrderStatus::Picked.is_terminal());
    assert!(!OrderStatus::Packed.is_terminal());
    assert!(OrderStatus::Shipped.is_terminal());
}

#[test]
fn derive_status_received_once_fully_received() {
    let lines = vec![
        PoLine { sku: "A".into(), qty: 10, received: 10 },
        PoLine { sku: "B".into(), qty: 5, received: 6 },
    ];
    assert_eq!(
        PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Ordered),
        PurchaseOrderStatus::Received
    );
}

#[test]
fn derive_status_ordered_when_partially_received() {
    let lines = vec![PoLine { sku: "A".into(), qty: 10, received: 3 }];
    assert_eq!(
        PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Draft),
        PurchaseOrderStatus::Ordered
    );
}

#[test]
fn derive_status_preserves_current_when_nothing_received() {
    let lines = vec![PoLine { sku: "A".into(), qty: 10, received: 0 }];
    assert_eq!(
        PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Draft),
        PurchaseOrderStatus::Draft
    );
    assert_eq!(
        PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Ordered),
        PurchaseOrderStatus::Ordered
    );
}

use std::sync::Arc;

use sqlx::PgPool;

use crate::allocation::AllocationEngine;
use crate::inventory_store::InventoryStore;
use crate::order_pipeline::OrderPipeline;
use crate::models::OrderStatus;

use super::helpers::{events, seed_inventory, seed_item, seed_location, seed_order, seed_order_line};

async fn allocated_order(pool: &PgPool, qty: i64) -> (uuid::Uuid, uuid::Uuid) {
    let item_id = seed_item(pool, "SKU-1", false).await;
    seed_location(pool, "A-01", 0, 0).await;
    seed_inventory(pool, item_id, "A-01", qty, 0, None, None).await;

    let order_id = seed_order(pool, "ORD-1").await;
    seed_order_line(pool, order_id, item_id, qty).await;

    let allocation = AllocationEngine::new(pool.clone(), events());
    allocation.allocate_order(order_id).await.unwrap();

    (order_id, item_id)
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_order_item_transitions_to_picked_when_fully_picked(pool: PgPool) {
    let inventory = Arc::new(InventoryStore::new(pool.clone(), events(), 3));
    let pipeline = OrderPipeline::new(pool.clone(), inventory, events());
    let (order_id, _) = allocated_order(&pool, 5).await;

    let result = pipeline.pick_order_item(order_id, "SKU-1", "A-01", 5, None, None).await.unwrap();

    assert_eq!(result.status, OrderStatus::Picked);
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_order_item_rejects_overpick(pool: PgPool) {
    let inventory = Arc::new(InventoryStore::new(pool.clone(), events(), 3));
    let pipeline = OrderPipeline::new(pool.clone(), inventory, events());
    let (order_id, _) = allocated_order(&pool, 5).await;

    let err = pipeline
        .pick_order_item(order_id, "SKU-1", "A-01", 6, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, wms_shared::Error::OverPick(_)));
}

#[sqlx::test(migrations = "../migrations")]
async fn pack_requires_picked_status(pool: PgPool) {
    let inventory = Arc::new(InventoryStore::new(pool.clone(), events(), 3));
    let pipeline = OrderPipeline::new(pool.clone(), inventory, events());
    let (order_id, _) = allocated_order(&pool, 5).await;

    let err = pipeline.pack(order_id).await.unwrap_err();
    assert!(matches!(err, wms_shared::Error::InvalidState(_)));

    pipeline.pick_order_item(order_id, "SKU-1", "A-01", 5, None, None).await.unwrap();
    let result = pipeline.pack(order_id).await.unwrap();
    assert_eq!(result.status, OrderStatus::Packed);
}

#[sqlx::test(migrations = "../migrations")]
async fn ship_transitions_packed_to_shipped(pool: PgPool) {
    let inventory = Arc::new(InventoryStore::new(pool.clone(), events(), 3));
    let pipeline = OrderPipeline::new(pool.clone(), inventory, events());
    let (order_id, _) = allocated_order(&pool, 5).await;

    pipeline.pick_order_item(order_id, "SKU-1", "A-01", 5, None, None).await.unwrap();
    pipeline.pack(order_id).await.unwrap();
    let result = pipeline.ship(order_id).await.unwrap();

    assert_eq!(result.status, OrderStatus::Shipped);
}

#[sqlx::test(migrations = "../migrations")]
async fn short_pick_reverts_order_to_pending_when_underallocated(pool: PgPool) {
    let inventory = Arc::new(InventoryStore::new(pool.clone(), events(), 3));
    let pipeline = OrderPipeline::new(pool.clone(), inventory, events());
    let (order_id, _) = allocated_order(&pool, 5).await;

    let result = pipeline.short_pick(order_id, "SKU-1", "A-01", 5).await.unwrap();

    assert_eq!(result.status, OrderStatus::Pending);

    let db_status: OrderStatus = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(db_status, OrderStatus::Pending);
}

#[sqlx::test(migrations = "../migrations")]
async fn short_pick_reverts_packed_serials_to_in_stock(pool: PgPool) {
    let inventory = Arc::new(InventoryStore::new(pool.clone(), events(), 3));
    let pipeline = OrderPipeline::new(pool.clone(), inventory.clone(), events());

    let item_id = seed_item(&pool, "SKU-SER", true).await;
    seed_location(&pool, "A-01", 0, 0).await;
    inventory
        .receive("SKU-SER", "A-01", 2, None, None, crate::models::InventoryStatus::Available, Some(&["SN-1".to_string(), "SN-2".to_string()]))
        .await
        .unwrap();

    let order_id = seed_order(&pool, "ORD-SER").await;
    seed_order_line(&pool, order_id, item_id, 2).await;

    let allocation = AllocationEngine::new(pool.clone(), events());
    allocation.allocate_order(order_id).await.unwrap();

    pipeline
        .pick_order_item(order_id, "SKU-SER", "A-01", 1, None, Some("SN-1"))
        .await
        .unwrap();

    // Manually fast-forward SN-1 to PACKED to exercise the revert path
    // without needing a full pack() across a partially-picked order.
    sqlx::query("UPDATE serial_numbers SET status = 'packed' WHERE serial = 'SN-1'")
        .execute(&pool)
        .await
        .unwrap();

    pipeline.short_pick(order_id, "SKU-SER", "A-01", 2).await.unwrap();

    let status: crate::models::SerialStatus =
        sqlx::query_scalar("SELECT status FROM serial_numbers WHERE serial = 'SN-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, crate::models::SerialStatus::InStock);
}

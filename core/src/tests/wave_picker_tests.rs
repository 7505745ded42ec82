use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::allocation::AllocationEngine;
use crate::inventory_store::InventoryStore;
use crate::order_pipeline::OrderPipeline;
use crate::wave_picker::WavePicker;

use super::helpers::{events, seed_inventory, seed_item, seed_location, seed_order, seed_order_line};

async fn allocated_order(pool: &PgPool, order_number: &str, item_id: Uuid, location_code: &str, qty: i64) -> Uuid {
    let order_id = seed_order(pool, order_number).await;
    seed_order_line(pool, order_id, item_id, qty).await;
    let allocation = AllocationEngine::new(pool.clone(), events());
    allocation.allocate_order(order_id).await.unwrap();
    let _ = location_code;
    order_id
}

#[sqlx::test(migrations = "../migrations")]
async fn wave_plan_aggregates_demand_and_sorts_by_position(pool: PgPool) {
    let order_pipeline = Arc::new(OrderPipeline::new(
        pool.clone(),
        Arc::new(InventoryStore::new(pool.clone(), events(), 3)),
        events(),
    ));
    let picker = WavePicker::new(pool.clone(), order_pipeline, events());

    let item_a = seed_item(&pool, "SKU-A", false).await;
    let item_b = seed_item(&pool, "SKU-B", false).await;
    seed_location(&pool, "B-05", 5, 5).await;
    seed_location(&pool, "A-01", 0, 0).await;
    seed_inventory(&pool, item_a, "B-05", 20, 0, None, None).await;
    seed_inventory(&pool, item_b, "A-01", 20, 0, None, None).await;

    let order1 = allocated_order(&pool, "ORD-1", item_a, "B-05", 3).await;
    let order2 = allocated_order(&pool, "ORD-2", item_b, "A-01", 4).await;

    let plan = picker.wave_plan(&[order1, order2]).await.unwrap();

    assert_eq!(plan.order_count, 2);
    assert_eq!(plan.pick_list.len(), 2);
    // Lower (x, y) must sort first, regardless of insertion order.
    assert_eq!(plan.pick_list[0].sku, "SKU-B");
    assert_eq!(plan.pick_list[1].sku, "SKU-A");
}

#[sqlx::test(migrations = "../migrations")]
async fn wave_plan_fails_when_no_allocated_orders_match(pool: PgPool) {
    let order_pipeline = Arc::new(OrderPipeline::new(
        pool.clone(),
        Arc::new(InventoryStore::new(pool.clone(), events(), 3)),
        events(),
    ));
    let picker = WavePicker::new(pool.clone(), order_pipeline, events());

    let order_id = seed_order(&pool, "ORD-PENDING").await;

    let err = picker.wave_plan(&[order_id]).await.unwrap_err();
    assert!(matches!(err, wms_shared::Error::Empty(_)));
}

#[sqlx::test(migrations = "../migrations")]
async fn create_cluster_batch_rejects_order_already_batched(pool: PgPool) {
    let order_pipeline = Arc::new(OrderPipeline::new(
        pool.clone(),
        Arc::new(InventoryStore::new(pool.clone(), events(), 3)),
        events(),
    ));
    let picker = WavePicker::new(pool.clone(), order_pipeline, events());

    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    seed_inventory(&pool, item_id, "A-01", 10, 0, None, None).await;
    let order_id = allocated_order(&pool, "ORD-1", item_id, "A-01", 5).await;

    picker.create_cluster_batch(&[order_id], "picker-1").await.unwrap();
    let err = picker.create_cluster_batch(&[order_id], "picker-2").await.unwrap_err();

    assert!(matches!(err, wms_shared::Error::InvalidState(_)));
}

#[sqlx::test(migrations = "../migrations")]
async fn get_cluster_tasks_distributes_fefo_bin_across_orders(pool: PgPool) {
    let order_pipeline = Arc::new(OrderPipeline::new(
        pool.clone(),
        Arc::new(InventoryStore::new(pool.clone(), events(), 3)),
        events(),
    ));
    let picker = WavePicker::new(pool.clone(), order_pipeline, events());

    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    seed_inventory(&pool, item_id, "A-01", 10, 0, None, None).await;

    let order1 = allocated_order(&pool, "ORD-1", item_id, "A-01", 3).await;
    let order2 = allocated_order(&pool, "ORD-2", item_id, "A-01", 4).await;

    let batch_id = picker.create_cluster_batch(&[order1, order2], "picker-1").await.unwrap();
    let tasks = picker.get_cluster_tasks(batch_id).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].total_qty, 7);
    assert_eq!(tasks[0].distribute_to.len(), 2);
}

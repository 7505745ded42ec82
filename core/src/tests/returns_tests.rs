use sqlx::PgPool;
use uuid::Uuid;

use crate::models::RmaStatus;
use crate::returns::ReturnsService;

use super::helpers::{events, seed_item, seed_location, seed_order};

async fn seed_rma(pool: &PgPool, rma_number: &str, order_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO rmas (id, rma_number, order_id, status, reason, created_at, updated_at)
         VALUES ($1, $2, $3, 'requested', 'defective', now(), now())",
    )
    .bind(id)
    .bind(rma_number)
    .bind(order_id)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_rma_line(pool: &PgPool, rma_id: Uuid, item_id: Uuid, qty_to_return: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO rma_lines (id, rma_id, item_id, qty_to_return, qty_received) VALUES ($1, $2, $3, $4, 0)",
    )
    .bind(id)
    .bind(rma_id)
    .bind(item_id)
    .bind(qty_to_return)
    .execute(pool)
    .await
    .unwrap();
    id
}

#[sqlx::test(migrations = "../migrations")]
async fn process_return_receipt_creates_quarantine_row_at_default_dock(pool: PgPool) {
    seed_location(&pool, "RETURNS-DOCK", 0, 0).await;
    let item_id = seed_item(&pool, "SKU-1", false).await;
    let order_id = seed_order(&pool, "ORD-1").await;
    let rma_id = seed_rma(&pool, "RMA-1", order_id).await;
    seed_rma_line(&pool, rma_id, item_id, 3).await;

    let service = ReturnsService::new(pool.clone(), events());
    let result = service.process_return_receipt(rma_id, None).await.unwrap();

    assert_eq!(result.status, RmaStatus::Received);
    assert_eq!(result.lines_restocked, 1);

    let (status, qty): (crate::models::InventoryStatus, i64) = sqlx::query_as(
        "SELECT status, quantity FROM inventory WHERE item_id = $1 AND location_code = 'RETURNS-DOCK'",
    )
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(status, crate::models::InventoryStatus::Quarantine);
    assert_eq!(qty, 3);
}

#[sqlx::test(migrations = "../migrations")]
async fn process_return_receipt_accumulates_into_existing_quarantine_row(pool: PgPool) {
    seed_location(&pool, "RETURNS-DOCK", 0, 0).await;
    let item_id = seed_item(&pool, "SKU-1", false).await;
    let order_id = seed_order(&pool, "ORD-1").await;

    let service = ReturnsService::new(pool.clone(), events());

    let rma1 = seed_rma(&pool, "RMA-1", order_id).await;
    seed_rma_line(&pool, rma1, item_id, 2).await;
    service.process_return_receipt(rma1, None).await.unwrap();

    let rma2 = seed_rma(&pool, "RMA-2", order_id).await;
    seed_rma_line(&pool, rma2, item_id, 5).await;
    service.process_return_receipt(rma2, None).await.unwrap();

    let qty: i64 = sqlx::query_scalar(
        "SELECT quantity FROM inventory WHERE item_id = $1 AND location_code = 'RETURNS-DOCK'",
    )
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(qty, 7);
}

#[sqlx::test(migrations = "../migrations")]
async fn process_return_receipt_rejects_already_received_rma(pool: PgPool) {
    seed_location(&pool, "RETURNS-DOCK", 0, 0).await;
    let item_id = seed_item(&pool, "SKU-1", false).await;
    let order_id = seed_order(&pool, "ORD-1").await;
    let rma_id = seed_rma(&pool, "RMA-1", order_id).await;
    seed_rma_line(&pool, rma_id, item_id, 1).await;

    let service = ReturnsService::new(pool.clone(), events());
    service.process_return_receipt(rma_id, None).await.unwrap();

    let err = service.process_return_receipt(rma_id, None).await.unwrap_err();
    assert!(matches!(err, wms_shared::Error::AlreadyProcessed(_)));
}

#[sqlx::test(migrations = "../migrations")]
async fn process_return_receipt_honors_explicit_location(pool: PgPool) {
    seed_location(&pool, "QA-HOLD", 1, 1).await;
    let item_id = seed_item(&pool, "SKU-1", false).await;
    let order_id = seed_order(&pool, "ORD-1").await;
    let rma_id = seed_rma(&pool, "RMA-1", order_id).await;
    seed_rma_line(&pool, rma_id, item_id, 4).await;

    let service = ReturnsService::new(pool.clone(), events());
    service.process_return_receipt(rma_id, Some("QA-HOLD")).await.unwrap();

    let qty: i64 = sqlx::query_scalar(
        "SELECT quantity FROM inventory WHERE item_id = $1 AND location_code = 'QA-HOLD'",
    )
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(qty, 4);
}

use sqlx::PgPool;

use crate::inventory_store::InventoryStore;
use crate::models::InventoryStatus;

use super::helpers::{events, seed_inventory, seed_item, seed_location};

#[sqlx::test(migrations = "../migrations")]
async fn receive_creates_row_when_none_exists(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;

    let result = store
        .receive("SKU-1", "A-01", 10, None, None, InventoryStatus::Available, None)
        .await
        .unwrap();

    assert_eq!(result.new_qty, 10);
}

#[sqlx::test(migrations = "../migrations")]
async fn receive_increments_existing_row(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;

    store
        .receive("SKU-1", "A-01", 10, None, None, InventoryStatus::Available, None)
        .await
        .unwrap();
    let result = store
        .receive("SKU-1", "A-01", 5, None, None, InventoryStatus::Available, None)
        .await
        .unwrap();

    assert_eq!(result.new_qty, 15);
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_prefers_earliest_expiry(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    let item_id = seed_item(&pool, "SKU-FEFO", false).await;
    seed_location(&pool, "A-01", 0, 0).await;

    let near = chrono::Utc::now().date_naive() + chrono::Duration::days(2);
    let far = chrono::Utc::now().date_naive() + chrono::Duration::days(30);
    let near_id = seed_inventory(&pool, item_id, "A-01", 5, 0, Some("LOT-NEAR"), Some(near)).await;
    let far_id = seed_inventory(&pool, item_id, "A-01", 5, 0, Some("LOT-FAR"), Some(far)).await;

    // pick() scans all lots for the item/location without pinning a lot,
    // so it must land on the row expiring soonest.
    store
        .pick("SKU-FEFO", "A-01", 3, Some("LOT-NEAR"), InventoryStatus::Available, None)
        .await
        .unwrap();

    let near_qty: i64 = sqlx::query_scalar("SELECT quantity FROM inventory WHERE id = $1")
        .bind(near_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let far_qty: i64 = sqlx::query_scalar("SELECT quantity FROM inventory WHERE id = $1")
        .bind(far_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(near_qty, 2);
    assert_eq!(far_qty, 5);
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_fails_when_insufficient_stock(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    seed_inventory(&pool, item_id, "A-01", 2, 0, None, None).await;

    let err = store
        .pick("SKU-1", "A-01", 5, None, InventoryStatus::Available, None)
        .await
        .unwrap_err();

    assert!(matches!(err, wms_shared::Error::NoStock(_)));
}

#[sqlx::test(migrations = "../migrations")]
async fn move_stock_transfers_quantity_between_locations(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    seed_location(&pool, "B-02", 5, 5).await;
    seed_inventory(&pool, item_id, "A-01", 10, 0, None, None).await;

    store.move_stock("SKU-1", "A-01", "B-02", 4, Some("picker-1")).await.unwrap();

    let src_qty: i64 =
        sqlx::query_scalar("SELECT quantity FROM inventory WHERE item_id = $1 AND location_code = 'A-01'")
            .bind(item_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    let dst_qty: i64 =
        sqlx::query_scalar("SELECT quantity FROM inventory WHERE item_id = $1 AND location_code = 'B-02'")
            .bind(item_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    assert_eq!(src_qty, 6);
    assert_eq!(dst_qty, 4);
}

#[sqlx::test(migrations = "../migrations")]
async fn versioned_update_applies_mutator_and_bumps_version(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    let inv_id = seed_inventory(&pool, item_id, "A-01", 10, 0, None, None).await;

    let updated = store
        .versioned_update(inv_id, |row| {
            row.quantity -= 3;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(updated.quantity, 7);
    assert_eq!(updated.version, 2);
}

#[sqlx::test(migrations = "../migrations")]
async fn versioned_update_unknown_row_is_unknown_entity(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);

    let err = store
        .versioned_update(uuid::Uuid::new_v4(), |row| {
            row.quantity += 1;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, wms_shared::Error::UnknownEntity(_)));
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_by_id_decrements_quantity_and_journals(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    let inv_id = seed_inventory(&pool, item_id, "A-01", 10, 4, None, None).await;

    let result = store.pick_by_id(inv_id, 6).await.unwrap();

    assert_eq!(result.remaining_qty, 4);

    let (quantity, reserved, version): (i64, i64, i64) = sqlx::query_as(
        "SELECT quantity, reserved_quantity, version FROM inventory WHERE id = $1",
    )
    .bind(inv_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(quantity, 4);
    assert_eq!(reserved, 0);
    assert_eq!(version, 2);

    let (action, quantity_change): (crate::models::JournalAction, i64) = sqlx::query_as(
        "SELECT action, quantity_change FROM transaction_log WHERE sku_snapshot = 'SKU-1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(action, crate::models::JournalAction::Pick);
    assert_eq!(quantity_change, -6);
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_by_id_fails_when_insufficient_stock(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);
    let item_id = seed_item(&pool, "SKU-1", false).await;
    seed_location(&pool, "A-01", 0, 0).await;
    let inv_id = seed_inventory(&pool, item_id, "A-01", 3, 0, None, None).await;

    let err = store.pick_by_id(inv_id, 5).await.unwrap_err();

    assert!(matches!(err, wms_shared::Error::NoStock(_)));

    let quantity: i64 = sqlx::query_scalar("SELECT quantity FROM inventory WHERE id = $1")
        .bind(inv_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(quantity, 3);

    let journal_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM transaction_log WHERE sku_snapshot = 'SKU-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(journal_count, 0);
}

#[sqlx::test(migrations = "../migrations")]
async fn pick_by_id_unknown_row_is_unknown_entity(pool: PgPool) {
    let store = InventoryStore::new(pool.clone(), events(), 3);

    let err = store.pick_by_id(uuid::Uuid::new_v4(), 1).await.unwrap_err();

    assert!(matches!(err, wms_shared::Error::UnknownEntity(_)));
}

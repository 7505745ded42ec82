//! Shared fixtures for the `#[sqlx::test]` suites in this module.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};

/// Drops every published event on the floor; tests assert on rows, not events.
#[derive(Default)]
pub struct NullEventPublisher;

#[async_trait]
impl EventPublisher for NullEventPublisher {
    async fn publish(&self, _event: DomainEvent) {}
}

pub fn events() -> Arc<dyn EventPublisher> {
    Arc::new(NullEventPublisher)
}

pub async fn seed_item(pool: &PgPool, sku: &str, is_serialized: bool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO items (id, sku, name, attributes, is_serialized, abc_class, created_at, updated_at)
         VALUES ($1, $2, $2, '{}'::jsonb, $3, NULL, now(), now())",
    )
    .bind(id)
    .bind(sku)
    .bind(is_serialized)
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn seed_location(pool: &PgPool, code: &str, x: i32, y: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO locations (id, location_code, location_type, zone, x, y, created_at)
         VALUES ($1, $2, 'pick', 'A', $3, $4, now())",
    )
    .bind(id)
    .bind(code)
    .bind(x)
    .bind(y)
    .execute(pool)
    .await
    .unwrap();
    id
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_inventory(
    pool: &PgPool,
    item_id: Uuid,
    location_code: &str,
    qty: i64,
    reserved: i64,
    lot_number: Option<&str>,
    expiry_date: Option<NaiveDate>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO inventory
         (id, item_id, location_code, lot_number, status, quantity, reserved_quantity,
          expiry_date, is_on_hold, version, created_at, updated_at)
         VALUES ($1, $2, $3, $4, 'available', $5, $6, $7, false, 1, now(), now())",
    )
    .bind(id)
    .bind(item_id)
    .bind(location_code)
    .bind(lot_number)
    .bind(qty)
    .bind(reserved)
    .bind(expiry_date)
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn seed_order(pool: &PgPool, order_number: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO orders
         (id, order_number, customer_name, customer_email, customer_address, status,
          is_on_hold, priority, batch_id, created_at, updated_at)
         VALUES ($1, $2, 'Test Customer', 'test@example.com', '1 Test St', 'pending',
                 false, 0, NULL, now(), now())",
    )
    .bind(id)
    .bind(order_number)
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn seed_order_line(pool: &PgPool, order_id: Uuid, item_id: Uuid, qty_ordered: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO order_lines
         (id, order_id, item_id, qty_ordered, qty_allocated, qty_picked, created_at, updated_at)
         VALUES ($1, $2, $3, $4, 0, 0, now(), now())",
    )
    .bind(id)
    .bind(order_id)
    .bind(item_id)
    .bind(qty_ordered)
    .execute(pool)
    .await
    .unwrap();
    id
}

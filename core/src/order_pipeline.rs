//! State machine driving an order through
//! PENDING → ALLOCATED → PICKED → PACKED → SHIPPED (spec §4.3).

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::inventory_store::InventoryStore;
use crate::models::{
    Inventory, InventoryStatus, Item, JournalAction, Order, OrderLine, OrderStatus,
    SYSTEM_SHORT_PICK_SESSION_PREFIX,
};

pub struct OrderPipeline {
    pool: PgPool,
    inventory: Arc<InventoryStore>,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusResult {
    pub status: OrderStatus,
}

impl OrderPipeline {
    pub fn new(pool: PgPool, inventory: Arc<InventoryStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            pool,
            inventory,
            events,
        }
    }

    pub fn inventory_store(&self) -> &InventoryStore {
        &self.inventory
    }

    async fn load_order_line(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderLine> {
        sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = $1 AND item_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(item_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::UnknownEntity(format!("order line for order {order_id} item {item_id}")))
    }

    /// pick_order_item(order, sku, loc, qty, lot?, serial?) — spec §4.3.
    ///
    /// Valid only when the order is ALLOCATED, or PICKED with room left
    /// on the line. Delegates the physical decrement to the inventory
    /// store's `pick` primitive, then bumps `line.qty_picked` in the same
    /// transaction boundary as the inventory decrement — `InventoryStore`'s
    /// `pick_in_tx` variant is used instead of its self-committing `pick`
    /// so the whole operation satisfies the single-transaction contract
    /// (spec §5 Atomicity).
    pub async fn pick_order_item(
        &self,
        order_id: Uuid,
        sku: &str,
        location_code: &str,
        qty: i64,
        lot_number: Option<&str>,
        serial: Option<&str>,
    ) -> Result<OrderStatusResult> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("order {order_id}")))?;

        if !matches!(order.status, OrderStatus::Allocated | OrderStatus::Picked) {
            return Err(Error::InvalidState(format!(
                "order {order_id} is {:?}, pick requires ALLOCATED or PICKED",
                order.status
            )));
        }

        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE sku = $1")
            .bind(sku)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("item sku={sku}")))?;

        let line = Self::load_order_line(&mut tx, order_id, item.id).await?;

        if line.qty_picked + qty > line.qty_allocated {
            return Err(Error::OverPick(format!(
                "line {} would pick {} of {} allocated",
                line.id,
                line.qty_picked + qty,
                line.qty_allocated
            )));
        }

        InventoryStore::pick_in_tx(&mut tx, sku, location_code, qty, lot_number, InventoryStatus::Available, serial)
            .await?;

        if let Some(serial) = serial {
            sqlx::query("UPDATE serial_numbers SET allocated_order_line_id = $1 WHERE serial = $2")
                .bind(line.id)
                .bind(serial)
                .execute(&mut *tx)
                .await?;
        }

        let new_qty_picked = line.qty_picked + qty;
        sqlx::query("UPDATE order_lines SET qty_picked = $1, updated_at = now() WHERE id = $2")
            .bind(new_qty_picked)
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

        let all_lines = sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

        let all_picked = all_lines.iter().all(|l| {
            if l.id == line.id {
                new_qty_picked >= l.qty_ordered
            } else {
                l.qty_picked >= l.qty_ordered
            }
        });

        let new_status = if all_picked { OrderStatus::Picked } else { order.status };
        sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
            .bind(new_status)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, sku, qty, status = ?new_status, "order line picked");
        self.events
            .publish(DomainEvent::new(
                "order.line_picked",
                serde_json::json!({"order_id": order_id, "sku": sku, "qty": qty}),
            ))
            .await;

        Ok(OrderStatusResult { status: new_status })
    }

    /// pack(order) — spec §4.3. Requires PICKED; journals a zero-quantity
    /// PACK entry per line for audit visibility.
    pub async fn pack(&self, order_id: Uuid) -> Result<OrderStatusResult> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("order {order_id}")))?;

        if order.status != OrderStatus::Picked {
            return Err(Error::InvalidState(format!(
                "order {order_id} is {:?}, pack requires PICKED",
                order.status
            )));
        }

        let lines = sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

        for line in &lines {
            let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
                .bind(line.item_id)
                .fetch_one(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO transaction_log
                 (id, timestamp, action, sku_snapshot, location_snapshot, quantity_change, lot_snapshot, actor)
                 VALUES ($1, now(), $2, $3, '', 0, NULL, NULL)",
            )
            .bind(Uuid::new_v4())
            .bind(JournalAction::Pack)
            .bind(&item.sku)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE orders SET status = 'packed', updated_at = now() WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, "order packed");
        self.events
            .publish(DomainEvent::new("order.packed", serde_json::json!({"order_id": order_id})))
            .await;

        Ok(OrderStatusResult {
            status: OrderStatus::Packed,
        })
    }

    /// ship(order) — spec §4.3. Requires PICKED or PACKED. Transitions
    /// assigned serials PACKED → SHIPPED and journals SHIP per line.
    pub async fn ship(&self, order_id: Uuid) -> Result<OrderStatusResult> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("order {order_id}")))?;

        if !matches!(order.status, OrderStatus::Picked | OrderStatus::Packed) {
            return Err(Error::InvalidState(format!(
                "order {order_id} is {:?}, ship requires PICKED or PACKED",
                order.status
            )));
        }

        let lines = sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

        for line in &lines {
            let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
                .bind(line.item_id)
                .fetch_one(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE serial_numbers SET status = 'shipped', updated_at = now()
                 WHERE allocated_order_line_id = $1 AND status = 'packed'",
            )
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO transaction_log
                 (id, timestamp, action, sku_snapshot, location_snapshot, quantity_change, lot_snapshot, actor)
                 VALUES ($1, now(), $2, $3, '', 0, NULL, NULL)",
            )
            .bind(Uuid::new_v4())
            .bind(JournalAction::Ship)
            .bind(&item.sku)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE orders SET status = 'shipped', updated_at = now() WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, "order shipped");
        self.events
            .publish(DomainEvent::new("order.shipped", serde_json::json!({"order_id": order_id})))
            .await;

        Ok(OrderStatusResult {
            status: OrderStatus::Shipped,
        })
    }

    /// short_pick(order, sku, loc, qty_missing) — spec §4.3. Compensates a
    /// discovered shortage: deallocates the missing qty, opens a
    /// SYS-ERR-* cycle count task on the affected row, and reverts the
    /// order to PENDING if it's no longer fully allocated.
    ///
    /// Per the spec's recommended (optional) behavior for serial
    /// lifecycle after short-pick (§9 open question 3), any serials
    /// already transitioned to PACKED for this line are reverted to
    /// IN_STOCK when the order reverts to PENDING.
    pub async fn short_pick(
        &self,
        order_id: Uuid,
        sku: &str,
        location_code: &str,
        qty_missing: i64,
    ) -> Result<OrderStatusResult> {
        if qty_missing <= 0 {
            return Err(Error::InvalidState(format!(
                "qty_missing must be positive, got {qty_missing}"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("order {order_id}")))?;

        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE sku = $1")
            .bind(sku)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("item sku={sku}")))?;

        let line = Self::load_order_line(&mut tx, order_id, item.id).await?;

        let deallocate = line.qty_allocated.min(qty_missing);
        let new_qty_allocated = line.qty_allocated - deallocate;

        sqlx::query("UPDATE order_lines SET qty_allocated = $1, updated_at = now() WHERE id = $2")
            .bind(new_qty_allocated)
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

        let inv_row = sqlx::query_as::<_, Inventory>(
            "SELECT * FROM inventory
             WHERE item_id = $1 AND location_code = $2 AND status = 'available'
             ORDER BY expiry_date ASC NULLS LAST, version ASC
             LIMIT 1
             FOR UPDATE",
        )
        .bind(item.id)
        .bind(location_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::UnknownEntity(format!("no inventory row for {sku} at {location_code}")))?;

        let new_reserved = (inv_row.reserved_quantity - deallocate).max(0);
        sqlx::query(
            "UPDATE inventory SET reserved_quantity = $1, version = version + 1, updated_at = now()
             WHERE id = $2",
        )
        .bind(new_reserved)
        .bind(inv_row.id)
        .execute(&mut *tx)
        .await?;

        let session_reference = format!("{SYSTEM_SHORT_PICK_SESSION_PREFIX}-{}", &Uuid::new_v4().to_string()[..8]);
        let existing_task: Option<Uuid> = sqlx::query_scalar(
            "SELECT t.id FROM cycle_count_tasks t
             JOIN cycle_count_sessions s ON s.id = t.session_id
             WHERE t.inventory_id = $1 AND s.reference LIKE 'SYS-ERR-%' AND t.status = 'pending'
             LIMIT 1",
        )
        .bind(inv_row.id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing_task.is_none() {
            let session_id: Uuid = sqlx::query_scalar(
                "INSERT INTO cycle_count_sessions (id, reference, status, device_id, created_at, updated_at)
                 VALUES ($1, $2, 'in_progress', NULL, now(), now()) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(&session_reference)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO cycle_count_tasks
                 (id, session_id, inventory_id, expected_qty, counted_qty, variance, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, NULL, NULL, 'pending', now(), now())",
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(inv_row.id)
            .bind(inv_row.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let mut new_status = order.status;
        if new_qty_allocated < line.qty_ordered && order.status != OrderStatus::Pending {
            new_status = OrderStatus::Pending;

            sqlx::query(
                "UPDATE serial_numbers SET status = 'in_stock', allocated_order_line_id = NULL, updated_at = now()
                 WHERE allocated_order_line_id = $1 AND status = 'packed'",
            )
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE orders SET status = 'pending', updated_at = now() WHERE id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(order_id = %order_id, sku, qty_missing, "short pick recorded");
        self.events
            .publish(DomainEvent::new(
                "order.short_pick",
                serde_json::json!({"order_id": order_id, "sku": sku, "qty_missing": qty_missing}),
            ))
            .await;

        Ok(OrderStatusResult { status: new_status })
    }
}

//! Owns the authoritative stock table (spec §4.1). Every public method
//! runs inside its own transaction: read-under-lock, mutation, journal
//! append, commit. Nothing here ever holds a lock across a suspension
//! point it doesn't have to.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::models::{Inventory, InventoryStatus, Item, JournalAction, Location, SerialNumber, SerialStatus};

pub struct InventoryStore {
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
    versioned_update_max_retries: u32,
}

/// Outcome of a [`InventoryStore::receive`] call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceiveResult {
    pub inventory_id: Uuid,
    pub new_qty: i64,
}

/// Outcome of a [`InventoryStore::pick`] call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PickResult {
    pub inventory_id: Uuid,
    pub remaining_qty: i64,
}

impl InventoryStore {
    pub fn new(pool: PgPool, events: Arc<dyn EventPublisher>, versioned_update_max_retries: u32) -> Self {
        Self {
            pool,
            events,
            versioned_update_max_retries,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_item_by_sku(tx: &mut Transaction<'_, Postgres>, sku: &str) -> Result<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE sku = $1")
            .bind(sku)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("item sku={sku}")))
    }

    async fn find_location(tx: &mut Transaction<'_, Postgres>, location_code: &str) -> Result<Location> {
        sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE location_code = $1")
            .bind(location_code)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("location {location_code}")))
    }

    /// Locks and returns the inventory row for the composite key, if any.
    async fn lock_inventory_row(
        tx: &mut Transaction<'_, Postgres>,
        item_id: Uuid,
        location_code: &str,
        lot_number: Option<&str>,
        status: InventoryStatus,
    ) -> Result<Option<Inventory>> {
        let row = sqlx::query_as::<_, Inventory>(
            "SELECT * FROM inventory
             WHERE item_id = $1 AND location_code = $2
               AND lot_number IS NOT DISTINCT FROM $3
               AND status = $4
             FOR UPDATE",
        )
        .bind(item_id)
        .bind(location_code)
        .bind(lot_number)
        .bind(status)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    async fn append_journal(
        tx: &mut Transaction<'_, Postgres>,
        action: JournalAction,
        sku_snapshot: &str,
        location_snapshot: &str,
        quantity_change: i64,
        lot_snapshot: Option<&str>,
        actor: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO transaction_log
             (id, timestamp, action, sku_snapshot, location_snapshot, quantity_change, lot_snapshot, actor)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(action)
        .bind(sku_snapshot)
        .bind(location_snapshot)
        .bind(quantity_change)
        .bind(lot_snapshot)
        .bind(actor)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// receive(sku, loc, qty, lot?, expiry?, status, serials?) — spec §4.1.
    ///
    /// Locates the composite-key row and inserts-or-increments it; two
    /// concurrent receives of the same key serialize on the row lock and
    /// each bump `version` once.
    #[allow(clippy::too_many_arguments)]
    pub async fn receive(
        &self,
        sku: &str,
        location_code: &str,
        qty: i64,
        lot_number: Option<&str>,
        expiry_date: Option<NaiveDate>,
        status: InventoryStatus,
        serials: Option<&[String]>,
    ) -> Result<ReceiveResult> {
        if qty <= 0 {
            return Err(Error::InvalidState(format!("receive qty must be positive, got {qty}")));
        }

        let mut tx = self.pool.begin().await?;

        let item = Self::find_item_by_sku(&mut tx, sku).await?;
        Self::find_location(&mut tx, location_code).await?;

        if item.is_serialized {
            match serials {
                Some(list) if list.len() as i64 == qty => {
                    for serial in list {
                        let exists: bool = sqlx::query_scalar(
                            "SELECT EXISTS(SELECT 1 FROM serial_numbers WHERE serial = $1)",
                        )
                        .bind(serial)
                        .fetch_one(&mut *tx)
                        .await?;
                        if exists {
                            return Err(Error::SerialMismatch(format!(
                                "serial {serial} already registered"
                            )));
                        }
                    }
                }
                _ => {
                    return Err(Error::SerialMismatch(format!(
                        "item {sku} is serialized: expected {qty} serials"
                    )));
                }
            }
        }

        let existing =
            Self::lock_inventory_row(&mut tx, item.id, location_code, lot_number, status).await?;

        let (inventory_id, new_qty) = match existing {
            Some(row) => {
                let new_qty = row.quantity + qty;
                sqlx::query(
                    "UPDATE inventory SET quantity = $1, version = version + 1, updated_at = now()
                     WHERE id = $2 AND version = $3",
                )
                .bind(new_qty)
                .bind(row.id)
                .bind(row.version)
                .execute(&mut *tx)
                .await?;
                (row.id, new_qty)
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO inventory
                     (id, item_id, location_code, lot_number, status, quantity, reserved_quantity,
                      expiry_date, is_on_hold, version, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, 0, $7, false, 1, now(), now())",
                )
                .bind(id)
                .bind(item.id)
                .bind(location_code)
                .bind(lot_number)
                .bind(status)
                .bind(qty)
                .bind(expiry_date)
                .execute(&mut *tx)
                .await?;
                (id, qty)
            }
        };

        if item.is_serialized {
            if let Some(list) = serials {
                for serial in list {
                    sqlx::query(
                        "INSERT INTO serial_numbers
                         (id, serial, item_id, location_code, inventory_id, status, allocated_order_line_id, created_at, updated_at)
                         VALUES ($1, $2, $3, $4, $5, 'in_stock', NULL, now(), now())",
                    )
                    .bind(Uuid::new_v4())
                    .bind(serial)
                    .bind(item.id)
                    .bind(location_code)
                    .bind(inventory_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        Self::append_journal(
            &mut tx,
            JournalAction::Receive,
            sku,
            location_code,
            qty,
            lot_number,
            None,
        )
        .await?;

        tx.commit().await?;

        info!(sku, location_code, qty, "received stock");
        self.events
            .publish(DomainEvent::new(
                "inventory.received",
                serde_json::json!({"sku": sku, "location_code": location_code, "qty": qty}),
            ))
            .await;

        Ok(ReceiveResult {
            inventory_id,
            new_qty,
        })
    }

    /// pick(sku, loc, qty, lot?, status, serial?) — spec §4.1. Picks a
    /// single candidate row, tiebreaking FEFO when multiple match. Runs
    /// in its own transaction; callers that need the decrement to share a
    /// transaction with other bookkeeping (e.g. the order pipeline) should
    /// use [`Self::pick_in_tx`] instead.
    pub async fn pick(
        &self,
        sku: &str,
        location_code: &str,
        qty: i64,
        lot_number: Option<&str>,
        status: InventoryStatus,
        serial: Option<&str>,
    ) -> Result<PickResult> {
        let mut tx = self.pool.begin().await?;
        let result = Self::pick_in_tx(&mut tx, sku, location_code, qty, lot_number, status, serial).await?;
        tx.commit().await?;

        self.events
            .publish(DomainEvent::new(
                "inventory.picked",
                serde_json::json!({"sku": sku, "location_code": location_code, "qty": qty}),
            ))
            .await;

        Ok(result)
    }

    /// Same contract as [`Self::pick`] but runs inside a caller-supplied
    /// transaction and does not publish an event or commit — used by
    /// components (order pipeline) that need the decrement to be atomic
    /// with their own row updates.
    pub async fn pick_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        sku: &str,
        location_code: &str,
        qty: i64,
        lot_number: Option<&str>,
        status: InventoryStatus,
        serial: Option<&str>,
    ) -> Result<PickResult> {
        if qty <= 0 {
            return Err(Error::InvalidState(format!("pick qty must be positive, got {qty}")));
        }

        let item = Self::find_item_by_sku(tx, sku).await?;

        let row = sqlx::query_as::<_, Inventory>(
            "SELECT * FROM inventory
             WHERE item_id = $1 AND location_code = $2
               AND lot_number IS NOT DISTINCT FROM $3
               AND status = $4
             ORDER BY expiry_date ASC NULLS LAST, version ASC
             LIMIT 1
             FOR UPDATE",
        )
        .bind(item.id)
        .bind(location_code)
        .bind(lot_number)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NoStock(format!("no inventory for {sku} at {location_code}")))?;

        if row.quantity < qty {
            return Err(Error::NoStock(format!(
                "requested {qty}, only {} available at row {}",
                row.quantity, row.id
            )));
        }

        if item.is_serialized {
            let serial = serial.ok_or_else(|| {
                Error::InvalidSerial(format!("item {sku} is serialized: serial required"))
            })?;
            let matched: Option<SerialNumber> = sqlx::query_as(
                "SELECT * FROM serial_numbers WHERE serial = $1 AND inventory_id = $2 AND status = 'in_stock' FOR UPDATE",
            )
            .bind(serial)
            .bind(row.id)
            .fetch_optional(&mut *tx)
            .await?;
            let matched = matched
                .ok_or_else(|| Error::InvalidSerial(format!("serial {serial} not IN_STOCK at this row")))?;
            sqlx::query("UPDATE serial_numbers SET status = 'packed', updated_at = now() WHERE id = $1")
                .bind(matched.id)
                .execute(&mut *tx)
                .await?;
        }

        let new_qty = row.quantity - qty;
        let new_reserved = (row.reserved_quantity - qty).max(0);

        let updated = sqlx::query(
            "UPDATE inventory SET quantity = $1, reserved_quantity = $2, version = version + 1, updated_at = now()
             WHERE id = $3 AND version = $4",
        )
        .bind(new_qty)
        .bind(new_reserved)
        .bind(row.id)
        .bind(row.version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::Conflict(format!("inventory row {} changed underneath us", row.id)));
        }

        Self::append_journal(
            tx,
            JournalAction::Pick,
            sku,
            location_code,
            -qty,
            lot_number,
            None,
        )
        .await?;

        Ok(PickResult {
            inventory_id: row.id,
            remaining_qty: new_qty,
        })
    }

    /// move(sku, src, dst, qty, actor?) — spec §4.1. Atomic pick-at-src +
    /// receive-at-dst of the same (lot, status, expiry). Opens and commits
    /// its own transaction; callers that need the move to share a
    /// transaction with other bookkeeping (e.g. replenishment task
    /// completion) should use [`Self::move_in_tx`] instead.
    pub async fn move_stock(
        &self,
        sku: &str,
        src_location: &str,
        dst_location: &str,
        qty: i64,
        actor: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::move_in_tx(&mut tx, sku, src_location, dst_location, qty, actor).await?;
        tx.commit().await?;

        self.events
            .publish(DomainEvent::new(
                "inventory.moved",
                serde_json::json!({"sku": sku, "src": src_location, "dst": dst_location, "qty": qty}),
            ))
            .await;

        Ok(())
    }

    /// Same contract as [`Self::move_stock`] but runs inside a
    /// caller-supplied transaction and does not publish an event or commit.
    pub async fn move_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        sku: &str,
        src_location: &str,
        dst_location: &str,
        qty: i64,
        actor: Option<&str>,
    ) -> Result<()> {
        if qty <= 0 {
            return Err(Error::InvalidState(format!("move qty must be positive, got {qty}")));
        }

        let item = Self::find_item_by_sku(tx, sku).await?;
        Self::find_location(tx, dst_location).await?;

        let src_row = sqlx::query_as::<_, Inventory>(
            "SELECT * FROM inventory
             WHERE item_id = $1 AND location_code = $2 AND status = 'available'
             ORDER BY expiry_date ASC NULLS LAST, version ASC
             LIMIT 1
             FOR UPDATE",
        )
        .bind(item.id)
        .bind(src_location)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NoStock(format!("no stock for {sku} at {src_location}")))?;

        if src_row.quantity < qty {
            return Err(Error::NoStock(format!(
                "requested move of {qty}, only {} available at {src_location}",
                src_row.quantity
            )));
        }

        let new_src_qty = src_row.quantity - qty;
        let updated = sqlx::query(
            "UPDATE inventory SET quantity = $1, version = version + 1, updated_at = now()
             WHERE id = $2 AND version = $3",
        )
        .bind(new_src_qty)
        .bind(src_row.id)
        .bind(src_row.version)
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::Conflict(format!("inventory row {} changed underneath us", src_row.id)));
        }

        let dst_row = Self::lock_inventory_row(
            tx,
            item.id,
            dst_location,
            src_row.lot_number.as_deref(),
            src_row.status,
        )
        .await?;

        match dst_row {
            Some(row) => {
                sqlx::query(
                    "UPDATE inventory SET quantity = quantity + $1, version = version + 1, updated_at = now()
                     WHERE id = $2 AND version = $3",
                )
                .bind(qty)
                .bind(row.id)
                .bind(row.version)
                .execute(&mut **tx)
                .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO inventory
                     (id, item_id, location_code, lot_number, status, quantity, reserved_quantity,
                      expiry_date, is_on_hold, version, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, 0, $7, false, 1, now(), now())",
                )
                .bind(Uuid::new_v4())
                .bind(item.id)
                .bind(dst_location)
                .bind(src_row.lot_number.as_deref())
                .bind(src_row.status)
                .bind(qty)
                .bind(src_row.expiry_date)
                .execute(&mut **tx)
                .await?;
            }
        }

        sqlx::query(
            "UPDATE serial_numbers SET location_code = $1, updated_at = now() WHERE inventory_id = $2",
        )
        .bind(dst_location)
        .bind(src_row.id)
        .execute(&mut **tx)
        .await?;

        let location_snapshot = format!("{src_location} > {dst_location}");
        Self::append_journal(
            tx,
            JournalAction::Move,
            sku,
            &location_snapshot,
            qty,
            src_row.lot_number.as_deref(),
            actor,
        )
        .await?;

        Ok(())
    }

    /// adjust(invRow, newQty, reason) — spec §4.1. Unconditionally sets
    /// quantity; used by the cycle count engine after variance detection.
    pub async fn adjust(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        inventory_id: Uuid,
        new_qty: i64,
        reason: &str,
    ) -> Result<i64> {
        let row = sqlx::query_as::<_, Inventory>("SELECT * FROM inventory WHERE id = $1 FOR UPDATE")
            .bind(inventory_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::UnknownEntity(format!("inventory row {inventory_id}")))?;

        let delta = new_qty - row.quantity;

        sqlx::query(
            "UPDATE inventory SET quantity = $1, version = version + 1, updated_at = now() WHERE id = $2",
        )
        .bind(new_qty)
        .bind(inventory_id)
        .execute(&mut **tx)
        .await?;

        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(row.item_id)
            .fetch_one(&mut **tx)
            .await?;

        Self::append_journal(
            tx,
            JournalAction::Adjust,
            &item.sku,
            &row.location_code,
            delta,
            row.lot_number.as_deref(),
            None,
        )
        .await?;

        warn!(inventory_id = %inventory_id, delta, reason, "inventory adjusted");
        Ok(delta)
    }

    /// The `versionedUpdate` primitive (spec §4.1): reads the row fresh
    /// each attempt, applies `mutator`, retries the conditional update up
    /// to `versioned_update_max_retries` times before surfacing
    /// [`Error::Conflict`]. A generic building block for callers that need
    /// an arbitrary field mutation without holding a lock across the whole
    /// operation; [`Self::pick_by_id`] is the one the spec names directly
    /// (the blind `pick(inventory_id, qty)` path, §6), but it doesn't route
    /// through this helper since it also needs to journal the decrement.
    pub async fn versioned_update<F>(&self, inventory_id: Uuid, mut mutator: F) -> Result<Inventory>
    where
        F: FnMut(&mut Inventory) -> Result<()>,
    {
        let mut attempt = 0;
        loop {
            let mut row = sqlx::query_as::<_, Inventory>("SELECT * FROM inventory WHERE id = $1")
                .bind(inventory_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::UnknownEntity(format!("inventory row {inventory_id}")))?;

            let old_version = row.version;
            mutator(&mut row)?;

            let result = sqlx::query(
                "UPDATE inventory
                 SET quantity = $1, reserved_quantity = $2, status = $3, is_on_hold = $4,
                     version = version + 1, updated_at = now()
                 WHERE id = $5 AND version = $6",
            )
            .bind(row.quantity)
            .bind(row.reserved_quantity)
            .bind(row.status)
            .bind(row.is_on_hold)
            .bind(inventory_id)
            .bind(old_version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                row.version = old_version + 1;
                return Ok(row);
            }

            attempt += 1;
            if attempt >= self.versioned_update_max_retries {
                return Err(Error::Conflict(format!(
                    "row {inventory_id} failed to update after {attempt} attempts"
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(5 * attempt as u64)).await;
        }
    }

    /// pick(inventory_id, qty) — spec §6 "pick (blind)". Decrements a
    /// specific row by id rather than resolving it by sku/location/lot, for
    /// callers that already hold the row's identity (e.g. a picker scanning
    /// a bin label). Retries the optimistic conditional update up to
    /// `versioned_update_max_retries` times on a lost race before
    /// surfacing `Conflict`, checks `NoStock` on each attempt, and journals
    /// a PICK entry in the same transaction as the successful update —
    /// mirrors `services.py::pick_item(inventory_id, qty_to_pick)`.
    pub async fn pick_by_id(&self, inventory_id: Uuid, qty: i64) -> Result<PickResult> {
        if qty <= 0 {
            return Err(Error::InvalidState(format!("pick qty must be positive, got {qty}")));
        }

        let mut attempt = 0;
        loop {
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query_as::<_, Inventory>("SELECT * FROM inventory WHERE id = $1")
                .bind(inventory_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| Error::UnknownEntity(format!("inventory row {inventory_id}")))?;

            if row.quantity < qty {
                return Err(Error::NoStock(format!(
                    "requested {qty}, only {} available at row {inventory_id}",
                    row.quantity
                )));
            }

            let new_qty = row.quantity - qty;
            let new_reserved = (row.reserved_quantity - qty).max(0);

            let updated = sqlx::query(
                "UPDATE inventory SET quantity = $1, reserved_quantity = $2, version = version + 1, updated_at = now()
                 WHERE id = $3 AND version = $4",
            )
            .bind(new_qty)
            .bind(new_reserved)
            .bind(inventory_id)
            .bind(row.version)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                attempt += 1;
                if attempt >= self.versioned_update_max_retries {
                    return Err(Error::Conflict(format!(
                        "row {inventory_id} failed to update after {attempt} attempts"
                    )));
                }
                tokio::time::sleep(std::time::Duration::from_millis(5 * attempt as u64)).await;
                continue;
            }

            let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
                .bind(row.item_id)
                .fetch_one(&mut *tx)
                .await?;

            Self::append_journal(
                &mut tx,
                JournalAction::Pick,
                &item.sku,
                &row.location_code,
                -qty,
                row.lot_number.as_deref(),
                None,
            )
            .await?;

            tx.commit().await?;

            self.events
                .publish(DomainEvent::new(
                    "inventory.picked",
                    serde_json::json!({"inventory_id": inventory_id, "qty": qty}),
                ))
                .await;

            return Ok(PickResult {
                inventory_id,
                remaining_qty: new_qty,
            });
        }
    }

    /// Locates the row for `(item_id, location_code, lot_number, status)`
    /// without a lock — used by read paths (allocation candidate scans use
    /// their own locked queries directly).
    pub async fn find_row(
        &self,
        item_id: Uuid,
        location_code: &str,
        lot_number: Option<&str>,
        status: InventoryStatus,
    ) -> Result<Option<Inventory>> {
        let row = sqlx::query_as::<_, Inventory>(
            "SELECT * FROM inventory
             WHERE item_id = $1 AND location_code = $2
               AND lot_number IS NOT DISTINCT FROM $3
               AND status = $4",
        )
        .bind(item_id)
        .bind(location_code)
        .bind(lot_number)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

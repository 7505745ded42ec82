//! Receiving against a purchase order line (spec §9.9, grounded in
//! `original_source/wms_backend/inventory/services.py::receive_po_item`).

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wms_shared::events::{DomainEvent, EventPublisher};
use wms_shared::{Error, Result};

use crate::inventory_store::InventoryStore;
use crate::models::{InventoryStatus, PoLine, PurchaseOrder, PurchaseOrderStatus};

pub struct PurchaseOrderService {
    pool: PgPool,
    inventory: Arc<InventoryStore>,
    events: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceivePoItemResult {
    pub po_status: PurchaseOrderStatus,
    pub line_received: i64,
    pub line_qty: i64,
}

impl PurchaseOrderService {
    pub fn new(pool: PgPool, inventory: Arc<InventoryStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            pool,
            inventory,
            events,
        }
    }

    /// receive_po_item(po_id, sku, loc, qty, lot?, expiry?) — receives
    /// physical stock via the inventory store, then replaces the PO's
    /// embedded line list wholesale with the updated `received` total
    /// (spec §9 design note: value object, not patched in place, to avoid
    /// torn writes on the JSON column).
    ///
    /// Per spec §9 Open Question 2, over-receipt is **not** capped here —
    /// the line's `received` may exceed its `qty`; callers that want to
    /// enforce a cap check `line_received <= line_qty` themselves.
    #[allow(clippy::too_many_arguments)]
    pub async fn receive_po_item(
        &self,
        po_id: Uuid,
        sku: &str,
        location_code: &str,
        qty: i64,
        lot_number: Option<&str>,
        expiry_date: Option<NaiveDate>,
    ) -> Result<ReceivePoItemResult> {
        if qty <= 0 {
            return Err(Error::InvalidState(format!("receive qty must be positive, got {qty}")));
        }

        // Validate the SKU is actually on this PO before touching physical
        // stock — a line list replace is cheap to retry, a receive is not.
        let existing: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT lines FROM purchase_orders WHERE id = $1")
                .bind(po_id)
                .fetch_optional(&self.pool)
                .await?;
        let existing = existing.ok_or_else(|| Error::UnknownEntity(format!("purchase order {po_id}")))?;
        let preflight: Vec<PoLine> = serde_json::from_value(existing).map_err(Error::Serialization)?;
        if !preflight.iter().any(|l| l.sku == sku) {
            return Err(Error::UnknownEntity(format!("sku {sku} not on PO {po_id}")));
        }

        // The inventory receive opens and commits its own transaction, so
        // the PO row's lock can't span it — the PO line list is re-locked
        // and patched afterward instead, mirroring the original's
        // call-then-patch sequencing (a failed receive returns its error
        // before the PO line list is touched at all).
        self.inventory
            .receive(sku, location_code, qty, lot_number, expiry_date, InventoryStatus::Available, None)
            .await?;

        let mut tx = self.pool.begin().await?;
        let po = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(po_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::UnknownEntity(format!("purchase order {po_id}")))?;

        let mut lines: Vec<PoLine> = po.parsed_lines().map_err(Error::Serialization)?;
        let target = lines
            .iter_mut()
            .find(|l| l.sku == sku)
            .ok_or_else(|| Error::UnknownEntity(format!("sku {sku} not on PO {po_id}")))?;
        target.received += qty;
        let line_received = target.received;
        let line_qty = target.qty;

        let new_status = PurchaseOrder::derive_status(&lines, po.status);
        let lines_json = serde_json::to_value(&lines).map_err(Error::Serialization)?;

        sqlx::query(
            "UPDATE purchase_orders SET lines = $1, status = $2, updated_at = now() WHERE id = $3",
        )
        .bind(lines_json)
        .bind(new_status)
        .bind(po_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(po_id = %po_id, sku, qty, status = ?new_status, "po item received");
        self.events
            .publish(DomainEvent::new(
                "purchase_order.item_received",
                serde_json::json!({"po_id": po_id, "sku": sku, "qty": qty, "status": format!("{:?}", new_status)}),
            ))
            .await;

        Ok(ReceivePoItemResult {
            po_status: new_status,
            line_received,
            line_qty,
        })
    }
}

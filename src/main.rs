use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wms_core::abc_classifier::AbcClassifier;
use wms_core::allocation::AllocationEngine;
use wms_core::cycle_count::CycleCountEngine;
use wms_core::inventory_store::InventoryStore;
use wms_core::order_pipeline::OrderPipeline;
use wms_core::purchase_orders::PurchaseOrderService;
use wms_core::replenishment::ReplenishmentPlanner;
use wms_core::returns::ReturnsService;
use wms_core::wave_picker::WavePicker;
use wms_shared::db;
use wms_shared::events::{EventPublisher, LoggingEventPublisher};
use wms_shared::Config;

/// Boot sequence for the inventory/order engine (spec §1, §9 Non-goals:
/// no HTTP surface). Loads configuration, wires the engine components
/// together behind a shared event publisher, runs migrations, and proves
/// the pool is live with a health check — the same role the teacher's
/// `main.rs` plays before it hands off to axum, minus the router.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wms=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(app = %config.app_name, version = %config.app_version, "configuration loaded");

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;
    info!("migrations applied");

    let events: Arc<dyn EventPublisher> = Arc::new(LoggingEventPublisher);

    let inventory = Arc::new(InventoryStore::new(
        pool.clone(),
        events.clone(),
        config.versioned_update_max_retries,
    ));
    let allocation = Arc::new(AllocationEngine::new(pool.clone(), events.clone()));
    let order_pipeline = Arc::new(OrderPipeline::new(pool.clone(), inventory.clone(), events.clone()));
    let cycle_count = CycleCountEngine::new(pool.clone(), events.clone());
    let replenishment = ReplenishmentPlanner::new(pool.clone(), events.clone());
    let wave_picker = WavePicker::new(pool.clone(), order_pipeline.clone(), events.clone());
    let abc_classifier = AbcClassifier::new(pool.clone(), events.clone());
    let purchase_orders = PurchaseOrderService::new(pool.clone(), inventory.clone(), events.clone());
    let returns = ReturnsService::new(pool.clone(), events.clone());

    // Keep the handles alive for the lifetime of the process; a real
    // deployment hands these to whatever RPC/HTTP surface sits on top.
    let _ = (
        &allocation,
        &order_pipeline,
        &cycle_count,
        &replenishment,
        &wave_picker,
        &abc_classifier,
        &purchase_orders,
        &returns,
    );

    db::health_check(&pool).await?;
    info!("wms-server ready");

    Ok(())
}

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::error::Result;

/// Builds the shared Postgres pool from a loaded [`Config`].
///
/// Every crate in the workspace takes `&PgPool` directly rather than a
/// wrapper type — there is no tenant-scoped connection context here, unlike
/// the teacher's multi-tenant pool, since the engine runs single-warehouse
/// per process (spec §9 Non-goals: no multi-warehouse federation).
pub async fn connect(config: &Config) -> Result<PgPool> {
    info!(
        max_connections = config.database_max_connections,
        min_connections = config.database_min_connections,
        "connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;

    info!("database pool ready");
    Ok(pool)
}

/// Runs the workspace migrations embedded at compile time from `/migrations`.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(())
}

/// Cheap liveness check used at boot and by health endpoints layered on top
/// of this crate (spec §1 — HTTP surface is an external collaborator).
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Application configuration, loaded once at startup from the environment
/// (and `.env` if present). Mirrors the teacher's env-var-driven
/// `AppConfig`, trimmed to what the inventory/order engine needs — there
/// is no HTTP surface to configure (spec §1 excludes routing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout_secs: u64,

    pub log_level: String,
    pub app_name: String,
    pub app_version: String,

    /// Max retries for the optimistic `versioned_update` path before
    /// surfacing `Error::Conflict` (spec §4.1 names N=3).
    pub versioned_update_max_retries: u32,

    /// Default limit applied to `create_random` cycle counts when the
    /// caller does not specify one.
    pub default_cycle_count_limit: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            database_min_connections: parse_or("DATABASE_MIN_CONNECTIONS", 2)?,
            database_connect_timeout_secs: parse_or("DATABASE_CONNECT_TIMEOUT_SECS", 30)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "wms-core".to_string()),
            app_version: env::var("APP_VERSION").unwrap_or_else(|_| "0.1.0".to_string()),

            versioned_update_max_retries: parse_or("VERSIONED_UPDATE_MAX_RETRIES", 3)?,
            default_cycle_count_limit: parse_or("DEFAULT_CYCLE_COUNT_LIMIT", 10)?,
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Velocity tier assigned by the ABC classifier (§4.7). `A` is fastest-moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "abc_class", rename_all = "snake_case")]
pub enum AbcClass {
    A,
    B,
    C,
}

/// Catalog entry. The `attributes` bag is opaque JSON — the core never
/// inspects its keys (spec §9 design note).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub attributes: serde_json::Value,
    pub is_serialized: bool,
    pub abc_class: Option<AbcClass>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, is_serialized: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sku: sku.into(),
            name: name.into(),
            attributes: serde_json::json!({}),
            is_serialized,
            abc_class: None,
            created_at: now,
            updated_at: now,
        }
    }
}

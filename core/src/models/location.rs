use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "location_type", rename_all = "snake_case")]
pub enum LocationType {
    Pick,
    Reserve,
    Dock,
    Staging,
}

/// A physical bucket stock can occupy. `(x, y)` drives walk-path ordering
/// for wave planning (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub location_code: String,
    pub location_type: LocationType,
    pub zone: String,
    pub x: i32,
    pub y: i32,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(location_code: impl Into<String>, location_type: LocationType, zone: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            location_code: location_code.into(),
            location_type,
            zone: zone.into(),
            x,
            y,
            created_at: Utc::now(),
        }
    }
}

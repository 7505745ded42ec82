use thiserror::Error;

/// Closed set of error kinds the core surfaces to callers (spec §7).
///
/// Every public operation returns either a success payload or exactly one
/// of these kinds with a human-readable detail message — no ad-hoc
/// variants are added at call sites.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient stock: {0}")]
    NoStock(String),

    #[error("over-pick: {0}")]
    OverPick(String),

    #[error("serial mismatch: {0}")]
    SerialMismatch(String),

    #[error("invalid serial: {0}")]
    InvalidSerial(String),

    #[error("optimistic concurrency conflict: {0}")]
    Conflict(String),

    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("nothing to do: {0}")]
    Empty(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Coarse-grained class for metrics/alerting; mirrors the kind a
    /// caller should branch on (recoverable vs client-fix vs server-side).
    pub fn class(&self) -> &'static str {
        match self {
            Error::UnknownEntity(_) => "unknown_entity",
            Error::InvalidState(_) => "invalid_state",
            Error::NoStock(_) => "no_stock",
            Error::OverPick(_) => "over_pick",
            Error::SerialMismatch(_) => "serial_mismatch",
            Error::InvalidSerial(_) => "invalid_serial",
            Error::Conflict(_) => "conflict",
            Error::AlreadyProcessed(_) => "already_processed",
            Error::Empty(_) => "empty",
            Error::Database(_) => "database",
            Error::Serialization(_) => "serialization",
        }
    }

    /// True for errors where retrying the same operation unmodified may
    /// succeed (optimistic conflicts); false for client-fix or terminal
    /// state errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

use common::{AggregateId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the aggregate store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stale-version save was rejected.
    /// The caller should re-fetch and retry the whole operation.
    #[error(
        "concurrency conflict for {aggregate_type} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

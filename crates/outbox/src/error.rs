use std::time::Duration;

use thiserror::Error;

/// Errors raised by the storage side: the outbox journal and the
/// repositories that write aggregate state next to it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version of the aggregate moved on since it was loaded.
    #[error(
        "Concurrency conflict for {aggregate_type} {aggregate_id}: expected version {expected}, found {actual:?}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        aggregate_id: String,
        expected: i64,
        actual: Option<i64>,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An event payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be turned back into a domain value.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// A domain value does not fit the column it is written to.
    #[error("Value does not fit {table}.{column}: {value}")]
    Unrepresentable {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    /// The backing store refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for journal and repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while handing a message to the broker.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The broker rejected the message or the connection failed.
    #[error("broker error: {0}")]
    Broker(String),

    /// The attempt did not complete within its deadline.
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

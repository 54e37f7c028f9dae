//! Domain error types.

use outbox::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The order or its outbox records could not be stored.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Stable error code exposed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Order(err) => err.code(),
            DomainError::Store(StoreError::ConcurrencyConflict { .. }) => "CONCURRENCY_CONFLICT",
            DomainError::Store(_) => "INTERNAL",
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::Store(StoreError::ConcurrencyConflict { .. } | StoreError::Unavailable(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_errors_keep_their_code() {
        let err = DomainError::from(OrderError::NoItems);
        assert_eq!(err.code(), "ORDER_001");
        assert_eq!(err.to_string(), "Order must contain at least one item");
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_errors_map_to_generic_codes() {
        let conflict = DomainError::from(StoreError::ConcurrencyConflict {
            aggregate_type: "Order",
            aggregate_id: "x".into(),
            expected: 1,
            actual: Some(2),
        });
        assert_eq!(conflict.code(), "CONCURRENCY_CONFLICT");
        assert!(conflict.is_retryable());

        let down = DomainError::from(StoreError::Unavailable("db down".into()));
        assert_eq!(down.code(), "INTERNAL");
    }
}

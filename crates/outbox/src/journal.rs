use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{OutboxRecord, PendingQuery, Result};

/// Delivery-side view of the outbox journal.
///
/// Records are appended by repositories inside their own storage
/// transaction, so appending is not part of this trait. The poller only
/// reads pending records and acknowledges them.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OutboxJournal: Send + Sync {
    /// Returns unprocessed records, oldest `created_at` first, ties broken by id.
    async fn fetch_unprocessed(&self, query: PendingQuery) -> Result<Vec<OutboxRecord>>;

    /// Flips `processed` from false to true.
    ///
    /// Returns `false` when the record was already processed (or is
    /// unknown), which happens when another poller won the race.
    async fn mark_processed(&self, id: i64) -> Result<bool>;

    /// Counts one exhausted delivery cycle against the record and keeps
    /// the last error for diagnosis. Returns the new attempt count.
    async fn record_failure(&self, id: i64, error: &str) -> Result<i32>;

    /// Number of records still waiting for delivery.
    async fn pending_count(&self) -> Result<u64>;

    /// Deletes processed records journaled before `older_than`.
    async fn purge_processed(&self, older_than: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl<T: OutboxJournal + ?Sized> OutboxJournal for Arc<T> {
    async fn fetch_unprocessed(&self, query: PendingQuery) -> Result<Vec<OutboxRecord>> {
        (**self).fetch_unprocessed(query).await
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        (**self).mark_processed(id).await
    }

    async fn record_failure(&self, id: i64, error: &str) -> Result<i32> {
        (**self).record_failure(id, error).await
    }

    async fn pending_count(&self) -> Result<u64> {
        (**self).pending_count().await
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> Result<u64> {
        (**self).purge_processed(older_than).await
    }
}

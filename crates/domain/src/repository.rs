//! Storage port for aggregates.

use async_trait::async_trait;
use common::AggregateId;
use outbox::{OutboxRecord, StoreError};

use crate::aggregate::AggregateRoot;
use crate::order::{Order, OrderEvent};

/// Persists orders together with their outbox records.
///
/// Implementations must write the order state and one outbox record per
/// pending event atomically: either both are visible afterwards or neither.
/// The write is guarded by the order's version, so a save based on a stale
/// copy fails with [`StoreError::ConcurrencyConflict`].
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Writes the order and its pending events in one transaction.
    ///
    /// Does not touch the order; see [`OrderRepository::save`].
    async fn persist(&self, order: &Order) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Loads the current state of an order. Loaded orders have no pending events.
    async fn find_by_id(&self, id: AggregateId) -> Result<Option<Order>, StoreError>;

    /// Removes an order. Outbox records already written are kept.
    async fn delete_by_id(&self, id: AggregateId) -> Result<bool, StoreError>;

    /// Persists the order and, once committed, drains its pending events.
    ///
    /// On failure the order keeps its pending events and version, so the
    /// same save can be retried.
    async fn save(&self, order: &mut Order) -> Result<Vec<OrderEvent>, StoreError> {
        let records = self.persist(order).await?;
        tracing::debug!(
            order_id = %order.id(),
            records = records.len(),
            "order persisted"
        );
        Ok(order.mark_persisted())
    }
}

//! In-memory order repository.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::AggregateId;
use outbox::{InMemoryOutboxJournal, OutboxRecord, StoreError};
use tokio::sync::RwLock;

use crate::aggregate::AggregateRoot;
use crate::repository::OrderRepository;

use super::Order;

/// Order repository backed by a map, writing to an [`InMemoryOutboxJournal`].
///
/// The map's write lock is held while the outbox records are appended, so a
/// reader never sees a stored order without its records or the reverse.
#[derive(Debug, Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<AggregateId, Order>>>,
    journal: InMemoryOutboxJournal,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    pub fn new(journal: InMemoryOutboxJournal) -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            journal,
            fail_on_save: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The journal this repository writes to.
    pub fn journal(&self) -> &InMemoryOutboxJournal {
        &self.journal
    }

    /// Makes every following save fail before anything is written.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new(InMemoryOutboxJournal::new())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn persist(&self, order: &Order) -> Result<Vec<OutboxRecord>, StoreError> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }
        let records = order.outbox_records()?;

        let mut orders = self.orders.write().await;
        let expected = order.version();
        let actual = orders.get(&order.id()).map(|stored| stored.version());
        if actual.unwrap_or(0) != expected {
            return Err(StoreError::ConcurrencyConflict {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: order.id().to_string(),
                expected,
                actual,
            });
        }

        let appended = self.journal.append(records).await;

        let mut stored = Order::reconstitute(order.to_parts());
        stored.mark_persisted();
        orders.insert(order.id(), stored);

        Ok(appended)
    }

    async fn find_by_id(&self, id: AggregateId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn delete_by_id(&self, id: AggregateId) -> Result<bool, StoreError> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use outbox::OutboxJournal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::order::{CustomerId, Email, Money, OrderItem};

    fn new_order() -> Order {
        Order::create(
            CustomerId::new("CUST-001").unwrap(),
            Email::parse("buyer@example.com").unwrap(),
            vec![OrderItem::new("prod-1", "Widget", 2, Money::usd(dec!(100)).unwrap()).unwrap()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn save_stores_order_and_journals_events() {
        let repo = InMemoryOrderRepository::default();
        let mut order = new_order();

        let events = repo.save(&mut order).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(order.version(), 1);
        assert!(order.pending_events().is_empty());

        let stored = repo.find_by_id(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.version(), 1);
        assert!(stored.pending_events().is_empty());

        let records = repo.journal().records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "OrderCreated");
        assert!(!records[0].processed);
    }

    #[tokio::test]
    async fn saving_without_changes_journals_nothing() {
        let repo = InMemoryOrderRepository::default();
        let mut order = new_order();
        repo.save(&mut order).await.unwrap();

        let events = repo.save(&mut order).await.unwrap();

        assert!(events.is_empty());
        assert_eq!(repo.journal().len().await, 1);
    }

    #[tokio::test]
    async fn stale_copy_conflicts() {
        let repo = InMemoryOrderRepository::default();
        let mut order = new_order();
        repo.save(&mut order).await.unwrap();

        let mut first = repo.find_by_id(order.id()).await.unwrap().unwrap();
        let mut second = first.clone();
        first.confirm().unwrap();
        repo.save(&mut first).await.unwrap();

        second.cancel("too late").unwrap();
        let err = repo.save(&mut second).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict {
                expected: 1,
                actual: Some(2),
                ..
            }
        ));
        assert_eq!(second.pending_events().len(), 1);
        assert_eq!(repo.journal().pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_save_writes_nothing() {
        let repo = InMemoryOrderRepository::default();
        repo.set_fail_on_save(true);
        let mut order = new_order();

        assert!(repo.save(&mut order).await.is_err());

        assert_eq!(order.pending_events().len(), 1);
        assert_eq!(order.version(), 0);
        assert!(repo.is_empty().await);
        assert!(repo.journal().is_empty().await);
    }

    #[tokio::test]
    async fn delete_keeps_journal() {
        let repo = InMemoryOrderRepository::default();
        let mut order = new_order();
        repo.save(&mut order).await.unwrap();

        assert!(repo.delete_by_id(order.id()).await.unwrap());
        assert!(!repo.delete_by_id(order.id()).await.unwrap());
        assert!(repo.find_by_id(order.id()).await.unwrap().is_none());
        assert_eq!(repo.journal().len().await, 1);
    }
}

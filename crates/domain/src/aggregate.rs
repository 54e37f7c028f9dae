//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::AggregateId;
use outbox::NewOutboxRecord;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Stored with each outbox record and used to pick the routing key.
    fn event_type(&self) -> &'static str;

    /// When the fact happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// An aggregate root persisted as a current-state snapshot.
///
/// State-changing operations append events to an in-memory pending list.
/// The repository writes those events to the outbox together with the new
/// state and only then calls [`AggregateRoot::mark_persisted`].
pub trait AggregateRoot: Send + Sync {
    /// The type of events this aggregate raises.
    type Event: DomainEvent;

    /// Returns the aggregate type name, e.g. `"Order"`.
    fn aggregate_type() -> &'static str;

    fn id(&self) -> AggregateId;

    /// Stored version, `0` for an aggregate that was never saved.
    fn version(&self) -> i64;

    /// Events raised since the last successful save, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Drains the pending events and advances the version.
    ///
    /// Only to be called after the storage transaction committed.
    fn mark_persisted(&mut self) -> Vec<Self::Event>;

    /// Builds one outbox record per pending event, stamped with the event time.
    fn outbox_records(&self) -> Result<Vec<NewOutboxRecord>, serde_json::Error> {
        self.pending_events()
            .iter()
            .map(|event| {
                NewOutboxRecord::for_event(
                    Self::aggregate_type(),
                    self.id(),
                    event.event_type(),
                    event,
                )
                .map(|record| record.created_at(event.occurred_at()))
            })
            .collect()
    }
}

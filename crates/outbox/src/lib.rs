//! Transactional outbox for domain events.
//!
//! Events are appended to the journal in the same storage transaction as
//! the aggregate state that produced them. An [`OutboxPoller`] later reads
//! the unprocessed records, routes each one to a broker routing key through
//! the [`MessageRouter`], publishes it with bounded retries and marks it
//! processed. Delivery is at-least-once: a record is only marked after the
//! broker accepted it, so a crash in between leads to a redelivery.

pub mod error;
pub mod journal;
pub mod memory;
pub mod nats;
pub mod poller;
pub mod postgres;
pub mod publisher;
pub mod record;
pub mod retry;
pub mod router;

pub use common::AggregateId;
pub use error::{PublishError, Result, StoreError};
pub use journal::OutboxJournal;
pub use memory::InMemoryOutboxJournal;
pub use nats::NatsPublisher;
pub use poller::{OutboxPoller, PollReport, PollerConfig, PollerHandle};
pub use postgres::PostgresOutboxJournal;
pub use publisher::{InMemoryPublisher, MessagePublisher, PublishedMessage};
pub use record::{NewOutboxRecord, OutboxRecord, PendingQuery};
pub use retry::RetryPolicy;
pub use router::{DEFAULT_ROUTING_KEY, MessageRouter};

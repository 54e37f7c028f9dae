use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A journaled domain event waiting for, or done with, broker delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxRecord {
    /// Monotonic identity assigned by the journal.
    pub id: i64,

    /// Kind of aggregate that raised the event (e.g. "Order").
    pub aggregate_type: String,

    /// Textual identity of the aggregate instance.
    pub aggregate_id: String,

    /// Stable event name (e.g. "OrderCreated"), used for routing.
    pub event_type: String,

    /// Serialized event.
    pub payload: serde_json::Value,

    /// When the record was journaled. Delivery follows this order.
    pub created_at: DateTime<Utc>,

    /// Set once the broker accepted the message. Never reset.
    pub processed: bool,

    pub processed_at: Option<DateTime<Utc>>,

    /// Delivery cycles that exhausted their retries without success.
    pub attempts: i32,

    pub last_error: Option<String>,
}

impl OutboxRecord {
    /// Bytes handed to the broker.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }
}

/// A record about to be appended to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutboxRecord {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewOutboxRecord {
    /// Serializes `event` into a record stamped with the current time.
    pub fn for_event<E: Serialize>(
        aggregate_type: impl Into<String>,
        aggregate_id: impl ToString,
        event_type: impl Into<String>,
        event: &E,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.to_string(),
            event_type: event_type.into(),
            payload: serde_json::to_value(event)?,
            created_at: Utc::now(),
        })
    }

    /// Overrides the journal timestamp, usually with the event's own time.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Materializes the record under the id the journal assigned.
    pub fn into_record(self, id: i64) -> OutboxRecord {
        OutboxRecord {
            id,
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            event_type: self.event_type,
            payload: self.payload,
            created_at: self.created_at,
            processed: false,
            processed_at: None,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Selection of unprocessed records for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingQuery {
    /// Upper bound on records returned. `None` returns all of them.
    pub limit: Option<usize>,

    /// Skip records whose failed cycle count reached this ceiling.
    pub max_attempts: Option<u32>,
}

impl PendingQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether a record is eligible under this query's attempt ceiling.
    pub fn admits(&self, record: &OutboxRecord) -> bool {
        !record.processed
            && self
                .max_attempts
                .is_none_or(|max| record.attempts < i32::try_from(max).unwrap_or(i32::MAX))
    }
}

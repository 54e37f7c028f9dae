//! Shared identifier types for the order and outbox crates.

mod types;

pub use types::{AggregateId, InvalidAggregateId};

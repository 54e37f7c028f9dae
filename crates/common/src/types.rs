use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identity of an aggregate root, such as an order.
///
/// Outbox records store it in its hyphenated text form, so it has to
/// survive a `to_string` / `parse` round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

/// Returned when text does not hold a valid aggregate identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid aggregate id: {0:?}")]
pub struct InvalidAggregateId(pub String);

impl AggregateId {
    /// Generates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a textual identity, ignoring surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, InvalidAggregateId> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| InvalidAggregateId(raw.to_string()))
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AggregateId {
    type Err = InvalidAggregateId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(AggregateId::new(), AggregateId::new());
    }

    #[test]
    fn text_form_parses_back_to_same_id() {
        let id = AggregateId::new();
        let parsed: AggregateId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_tolerates_whitespace() {
        let uuid = Uuid::new_v4();
        let id = AggregateId::parse(&format!("  {uuid} ")).unwrap();
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = AggregateId::parse("ORDER-1").unwrap_err();
        assert_eq!(err, InvalidAggregateId("ORDER-1".to_string()));
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = AggregateId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}

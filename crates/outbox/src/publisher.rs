use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::PublishError;

/// Outbound port to the message broker.
///
/// `Ok(())` means the broker accepted the message. Only then may the
/// corresponding outbox record be marked processed.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: MessagePublisher + ?Sized> MessagePublisher for Arc<T> {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(routing_key, payload).await
    }
}

/// A message accepted by the [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Debug, Default)]
struct PublisherState {
    messages: Vec<PublishedMessage>,
    attempts: usize,
    fail_next: usize,
    failing_keys: HashSet<String>,
    delay: Option<Duration>,
}

/// Broker stand-in that keeps accepted messages in memory.
///
/// Failures and slowness can be scripted to exercise the poller's retry
/// and timeout handling. Nothing leaves the process, so it is only fit for
/// tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` publish calls fail, whatever their key.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Makes every publish on `routing_key` fail until cleared.
    pub fn fail_routing_key(&self, routing_key: impl Into<String>) {
        self.lock().failing_keys.insert(routing_key.into());
    }

    /// Delays each publish call, to trigger attempt timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_next = 0;
        state.failing_keys.clear();
    }

    /// Accepted messages, in publish order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.lock().messages.clone()
    }

    pub fn messages_for(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Publish calls made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let delay = {
            let mut state = self.lock();
            state.attempts += 1;
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PublishError::Broker("scripted failure".to_string()));
        }
        if state.failing_keys.contains(routing_key) {
            return Err(PublishError::Broker(format!(
                "routing key {routing_key} rejected"
            )));
        }

        state.messages.push(PublishedMessage {
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_accepted_messages() {
        let publisher = InMemoryPublisher::new();
        publisher.publish("order.created", br#"{"a":1}"#).await.unwrap();

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].routing_key, "order.created");
        assert_eq!(messages[0].json().unwrap()["a"], 1);
        assert_eq!(publisher.attempts(), 1);
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_that_many_calls() {
        let publisher = InMemoryPublisher::new();
        publisher.fail_next(2);

        assert!(publisher.publish("k", b"1").await.is_err());
        assert!(publisher.publish("k", b"2").await.is_err());
        assert!(publisher.publish("k", b"3").await.is_ok());

        assert_eq!(publisher.attempts(), 3);
        assert_eq!(publisher.messages().len(), 1);
    }

    #[tokio::test]
    async fn failing_key_only_affects_that_key() {
        let publisher = InMemoryPublisher::new();
        publisher.fail_routing_key("order.created");

        assert!(publisher.publish("order.created", b"{}").await.is_err());
        assert!(publisher.publish("order.paid", b"{}").await.is_ok());
        assert!(publisher.messages_for("order.created").is_empty());

        publisher.clear_failures();
        assert!(publisher.publish("order.created", b"{}").await.is_ok());
    }

    #[tokio::test]
    async fn works_behind_a_trait_object() {
        let publisher = InMemoryPublisher::new();
        let shared: Arc<dyn MessagePublisher> = Arc::new(publisher.clone());

        shared.publish("order.events", b"{}").await.unwrap();
        assert_eq!(publisher.messages_for("order.events").len(), 1);
    }
}

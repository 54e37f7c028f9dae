use async_trait::async_trait;

use crate::{MessagePublisher, PublishError};

/// Publishes outbox messages to NATS, using the routing key as subject.
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    /// Connects to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self, PublishError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| PublishError::Broker(format!("connect to {url}: {e}")))?;
        tracing::info!(%url, "connected to NATS");
        Ok(Self::new(client))
    }
}

#[async_trait]
impl MessagePublisher for NatsPublisher {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.client
            .publish(routing_key.to_string(), payload.to_vec().into())
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;

        // Publish only buffers; flushing makes Ok mean the server has the message.
        self.client
            .flush()
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))
    }
}

//! Event stream transport.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

/// Where an event landed once the transport acknowledged it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub topic: String,
    /// Always `None` for transports without partitioning.
    pub partition: Option<i32>,
    pub offset: String,
}

#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
        headers: &[(String, String)],
    ) -> Result<DeliveryMetadata, anyhow::Error>;
}

/// Publishes events as entries of a Redis stream named after the topic.
///
/// Entry layout: `key`, `payload`, then one `h:<name>` field per header.
#[derive(Clone)]
pub struct RedisStreamTransport {
    manager: ConnectionManager,
}

impl RedisStreamTransport {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventTransport for RedisStreamTransport {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
        headers: &[(String, String)],
    ) -> Result<DeliveryMetadata, anyhow::Error> {
        let mut conn = self.manager.clone();

        let mut cmd = redis::cmd("XADD");
        cmd.arg(topic)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("payload")
            .arg(payload);
        for (name, value) in headers {
            cmd.arg(format!("h:{}", name)).arg(value);
        }

        let entry_id: String = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to append to stream {}: {}", topic, e))?;

        Ok(DeliveryMetadata {
            topic: topic.to_string(),
            partition: None,
            offset: entry_id,
        })
    }
}

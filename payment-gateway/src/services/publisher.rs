//! Transaction event publication.

use metrics::counter;
use service_core::retry::{retry_async, RetryConfig};
use std::sync::Arc;
use tracing::instrument;

use super::events::{DeliveryMetadata, EventTransport};
use crate::models::Transaction;

pub const EVENT_TYPE_TRANSACTION_COMPLETED: &str = "transaction_completed";
pub const EVENT_VERSION: &str = "1.0";

pub struct TransactionPublisher {
    transport: Arc<dyn EventTransport>,
    topic: String,
    retry: RetryConfig,
}

impl TransactionPublisher {
    /// Publisher with the default backoff: 3 retries, 100ms doubling up to 2s.
    pub fn new(transport: Arc<dyn EventTransport>, topic: impl Into<String>) -> Self {
        Self::with_retry(transport, topic, RetryConfig::default())
    }

    pub fn with_retry(
        transport: Arc<dyn EventTransport>,
        topic: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            topic: topic.into(),
            retry,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn headers(trx: &Transaction) -> Vec<(String, String)> {
        let payment_method = trx
            .payment_method
            .map(|m| m.as_str())
            .unwrap_or_default();

        vec![
            ("event_type".into(), EVENT_TYPE_TRANSACTION_COMPLETED.into()),
            ("event_version".into(), EVENT_VERSION.into()),
            (
                "transaction_type".into(),
                trx.transaction_type.as_str().into(),
            ),
            ("payment_method".into(), payment_method.into()),
            ("currency".into(), trx.currency.clone()),
        ]
    }

    /// Send one transaction event, keyed by its correlation id.
    #[instrument(skip(self, trx), fields(topic = %self.topic, key = %trx.transaction_id))]
    pub async fn publish(&self, trx: &Transaction) -> Result<DeliveryMetadata, anyhow::Error> {
        let payload = serde_json::to_string(trx)?;
        let headers = Self::headers(trx);

        let metadata = self
            .transport
            .send(&self.topic, &trx.transaction_id, &payload, &headers)
            .await?;

        tracing::debug!(offset = %metadata.offset, "Transaction event delivered");
        Ok(metadata)
    }

    /// [`publish`](Self::publish) with capped exponential backoff. The last
    /// failure is returned once the retry budget is spent.
    pub async fn publish_with_retry(
        &self,
        trx: &Transaction,
    ) -> Result<DeliveryMetadata, anyhow::Error> {
        let result = retry_async(
            &self.retry,
            "publish_transaction_event",
            |_: &anyhow::Error| true,
            || self.publish(trx),
        )
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!("transaction_events_published_total", "outcome" => outcome).increment(1);

        result
    }
}

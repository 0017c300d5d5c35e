use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

/// Outbound channel for domain events (order placed, payment settled, ...).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Publisher used when no broker is configured: events only reach the log.
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(topic, key, payload, "Domain event");
        Ok(())
    }
}

/// Serializes and publishes an event. Delivery is best effort: failures are
/// logged and never fail the caller's operation.
pub async fn publish_event<T: Serialize + Sync>(
    publisher: &dyn EventPublisher,
    topic: &str,
    key: &str,
    event: &T,
) {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to serialize {} event: {}", topic, e);
            return;
        }
    };

    if let Err(e) = publisher.publish(topic, key, &payload).await {
        warn!("Failed to publish {} event for {}: {}", topic, key, e);
    }
}

use async_trait::async_trait;
use serde_json::json;
use shopfront_core::EventPublisher;
use tracing::{error, info};

use crate::redis_repo::RedisClient;

/// Publishes domain events on Redis pub/sub. The channel is the event topic;
/// the message wraps the key and the JSON payload.
#[derive(Clone)]
pub struct RedisEventPublisher {
    redis: RedisClient,
}

impl RedisEventPublisher {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    fn envelope(key: &str, payload: &str) -> String {
        let payload = serde_json::from_str::<serde_json::Value>(payload)
            .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));
        json!({ "key": key, "payload": payload }).to_string()
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.redis.publish(topic, &Self::envelope(key, payload)).await {
            Ok(receivers) => {
                info!("Sent event to {}/{}: {} receiver(s)", topic, key, receivers);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send event to {}: {}", topic, e);
                Err(Box::new(e))
            }
        }
    }
}

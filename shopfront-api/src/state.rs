use std::sync::Arc;

use shopfront_order::{OrderPlacementService, PaymentOrchestrator};
use shopfront_store::app_config::RateLimitConfig;
use shopfront_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub placement: Arc<OrderPlacementService>,
    pub payments: Arc<PaymentOrchestrator>,
    /// Enables per-IP rate limiting when present.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    /// Storefront origin for the post-payment browser redirects.
    pub client_base_url: String,
    pub metrics: Arc<Metrics>,
}

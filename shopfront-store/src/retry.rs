use std::future::Future;
use std::time::Duration;

use shopfront_core::GatewayError;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Bounded exponential backoff for payment provider calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("{} succeeded after {} attempts", label, attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                if attempts >= config.max_attempts.max(1) || !error.is_retryable() {
                    warn!("{} failed after {} attempt(s): {}", label, attempts, error);
                    return Err(error);
                }

                warn!("{} attempt {} failed: {}. Retrying in {:?}", label, attempts, error, delay);
                sleep(delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

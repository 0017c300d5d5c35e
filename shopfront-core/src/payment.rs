use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider-side lifecycle of a payment intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Created,
    Saved,
    Approved,
    PayerActionRequired,
    Completed,
    Voided,
    Declined,
    Unrecognized,
}

impl IntentStatus {
    pub fn from_provider(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "CREATED" => Self::Created,
            "SAVED" => Self::Saved,
            "APPROVED" => Self::Approved,
            "PAYER_ACTION_REQUIRED" => Self::PayerActionRequired,
            "COMPLETED" => Self::Completed,
            "VOIDED" => Self::Voided,
            "DECLINED" => Self::Declined,
            _ => Self::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID, returned later as the redirect `token`
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
    pub approval_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    pub id: String,
    pub status: IntentStatus,
}

impl CaptureResult {
    pub fn is_completed(&self) -> bool {
        self.status == IntentStatus::Completed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment provider timed out: {0}")]
    Timeout(String),

    #[error("Payment provider unavailable ({status}): {message}")]
    Transient { status: u16, message: String },

    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Payment provider credentials rejected: {0}")]
    Unauthorized(String),

    #[error("Payment provider unreachable: {0}")]
    Transport(String),

    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Worth another attempt: timeouts, network failures, 429 and 5xx.
    /// Declines and credential problems are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout(_) | GatewayError::Transient { .. } | GatewayError::Transport(_)
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::Transient { status: 429, .. })
    }
}

/// External payment provider, injected into the payment orchestrator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Capture a previously authorized payment
    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, GatewayError>;
}

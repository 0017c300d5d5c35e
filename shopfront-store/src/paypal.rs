use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shopfront_core::payment::{CaptureResult, GatewayError, IntentStatus, PaymentGateway, PaymentIntent};
use shopfront_shared::Masked;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app_config::PaypalConfig;
use crate::retry::{with_retry, RetryConfig};

/// Refresh the OAuth token this long before PayPal says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct LinkDescription {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<LinkDescription>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// PayPal Orders v2 client.
pub struct PaypalClient {
    http: reqwest::Client,
    config: PaypalConfig,
    retry: RetryConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PaypalClient {
    pub fn new(config: PaypalConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let retry = RetryConfig {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            ..RetryConfig::default()
        };

        Ok(Self {
            http,
            config,
            retry,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport_error)?;

        let token: TokenResponse = parse(response).await?;
        debug!("Obtained PayPal access token, valid for {}s", token.expires_in);

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    async fn create_order_once(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<OrderResponse, GatewayError> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order_id.to_string(),
                "description": format!("Order {}", order_id),
                "amount": {
                    "currency_code": currency,
                    "value": format!("{:.2}", amount.round_dp(2)),
                }
            }],
            "application_context": {
                "return_url": self.config.return_url,
                "cancel_url": self.config.cancel_url,
                "user_action": "PAY_NOW",
            }
        });

        let response = self
            .http
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        self.parse_authorized(response).await
    }

    async fn capture_once(&self, paypal_order_id: &str) -> Result<OrderResponse, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", paypal_order_id)))
            .bearer_auth(token)
            // Same id on every retry so PayPal captures at most once
            .header("PayPal-Request-Id", format!("capture-{}", paypal_order_id))
            .json(&json!({}))
            .send()
            .await
            .map_err(transport_error)?;

        self.parse_authorized(response).await
    }

    async fn parse_authorized<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let result = parse(response).await;
        if matches!(result, Err(GatewayError::Unauthorized(_))) {
            self.forget_token().await;
        }
        result
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()));
    }

    let message = response.text().await.unwrap_or_default();
    let code = status.as_u16();
    Err(match code {
        401 => GatewayError::Unauthorized(message),
        429 | 500..=599 => GatewayError::Transient { status: code, message },
        _ => GatewayError::Rejected { status: code, message },
    })
}

#[async_trait]
impl PaymentGateway for PaypalClient {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let created = with_retry(&self.retry, "paypal create order", || {
            self.create_order_once(order_id, amount, currency)
        })
        .await?;

        let approval_url = created
            .links
            .iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href.clone());

        info!(
            "PayPal order {:?} created for order {} ({} {})",
            Masked(&created.id),
            order_id,
            amount,
            currency
        );

        Ok(PaymentIntent {
            status: IntentStatus::from_provider(&created.status),
            id: created.id,
            order_id,
            amount,
            currency: currency.to_string(),
            approval_url,
            created_at: Utc::now(),
        })
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, GatewayError> {
        let captured = with_retry(&self.retry, "paypal capture", || self.capture_once(intent_id)).await?;

        info!("PayPal order {:?} capture status {}", Masked(intent_id), captured.status);

        Ok(CaptureResult {
            status: IntentStatus::from_provider(&captured.status),
            id: captured.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> PaypalConfig {
        PaypalConfig {
            base_url: server.uri(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            return_url: "http://shop.test/payments/success".into(),
            cancel_url: "http://shop.test/payments/cancel".into(),
            timeout_ms: 200,
            max_attempts: 3,
            initial_backoff_ms: 1,
        }
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AA-token",
                "token_type": "Bearer",
                "expires_in": 32400
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_intent_returns_approval_link() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        let order_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .and(header("authorization", "Bearer A21AA-token"))
            .and(body_partial_json(json!({
                "intent": "CAPTURE",
                "purchase_units": [{
                    "reference_id": order_id.to_string(),
                    "amount": {"currency_code": "USD", "value": "35.50"}
                }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "5O190127TN364715T",
                "status": "CREATED",
                "links": [
                    {"href": "https://api.paypal.test/v2/checkout/orders/5O190127TN364715T", "rel": "self", "method": "GET"},
                    {"href": "https://www.paypal.test/checkoutnow?token=5O190127TN364715T", "rel": "approve", "method": "GET"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        let intent = client.create_intent(order_id, dec!(35.5), "USD").await.unwrap();

        assert_eq!(intent.id, "5O190127TN364715T");
        assert_eq!(intent.status, IntentStatus::Created);
        assert_eq!(
            intent.approval_url.as_deref(),
            Some("https://www.paypal.test/checkoutnow?token=5O190127TN364715T")
        );
    }

    #[tokio::test]
    async fn test_capture_is_idempotent_and_reuses_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-1/capture"))
            .and(header("PayPal-Request-Id", "capture-ORDER-1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "ORDER-1",
                "status": "COMPLETED"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        assert!(client.capture_payment("ORDER-1").await.unwrap().is_completed());
        assert!(client.capture_payment("ORDER-1").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_capture_retries_server_errors() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-2/capture"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-2/capture"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "ORDER-2",
                "status": "COMPLETED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        assert!(client.capture_payment("ORDER-2").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_declined_capture_is_not_retried() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-3/capture"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{"issue": "INSTRUMENT_DECLINED"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        assert_matches!(
            client.capture_payment("ORDER-3").await,
            Err(GatewayError::Rejected { status: 422, message }) if message.contains("INSTRUMENT_DECLINED")
        );
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_after_retries() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-4/capture"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        let err = client.capture_payment("ORDER-4").await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-5/capture"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "ORDER-5", "status": "COMPLETED"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        assert_matches!(client.capture_payment("ORDER-5").await, Err(GatewayError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_final() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = PaypalClient::new(config(&server)).unwrap();
        assert_matches!(client.capture_payment("ORDER-6").await, Err(GatewayError::Unauthorized(_)));
    }
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use shopfront_api::metrics::Metrics;
use shopfront_api::middleware::auth::issue_token;
use shopfront_api::state::{AppState, AuthConfig};
use shopfront_api::app;
use shopfront_core::payment::{CaptureResult, GatewayError, IntentStatus, PaymentGateway, PaymentIntent};
use shopfront_core::LogEventPublisher;
use shopfront_order::{OrderPlacementService, PaymentOrchestrator};
use shopfront_store::app_config::RateLimitConfig;
use shopfront_store::InMemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "test-secret";
pub const CLIENT_BASE_URL: &str = "http://shop.test";

/// Gateway double: intents always succeed, capture answers are queued per test.
#[derive(Default)]
pub struct FakeGateway {
    captures: Mutex<Vec<Result<IntentStatus, GatewayError>>>,
    intent_failure: Mutex<Option<GatewayError>>,
    capture_calls: Mutex<usize>,
}

impl FakeGateway {
    pub fn queue_capture(&self, answer: Result<IntentStatus, GatewayError>) {
        self.captures.lock().unwrap().push(answer);
    }

    pub fn fail_intents_with(&self, error: GatewayError) {
        *self.intent_failure.lock().unwrap() = Some(error);
    }

    pub fn capture_calls(&self) -> usize {
        *self.capture_calls.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        if let Some(error) = self.intent_failure.lock().unwrap().take() {
            return Err(error);
        }
        let id = format!("PAYPAL-{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            approval_url: Some(format!("https://paypal.test/checkoutnow?token={}", id)),
            id,
            order_id,
            amount,
            currency: currency.to_string(),
            status: IntentStatus::Created,
            created_at: chrono::Utc::now(),
        })
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, GatewayError> {
        *self.capture_calls.lock().unwrap() += 1;
        let mut queued = self.captures.lock().unwrap();
        let answer = if queued.is_empty() {
            Ok(IntentStatus::Completed)
        } else {
            queued.remove(0)
        };
        answer.map(|status| CaptureResult { id: intent_id.to_string(), status })
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<FakeGateway>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let publisher = Arc::new(LogEventPublisher);

        let placement = OrderPlacementService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            publisher.clone(),
        );
        let payments = PaymentOrchestrator::new(
            gateway.clone(),
            store.clone(),
            store.clone(),
            publisher,
            "USD",
        );

        let state = AppState {
            placement: Arc::new(placement),
            payments: Arc::new(payments),
            redis: None,
            rate_limit: RateLimitConfig { requests: 100, window_seconds: 60 },
            auth: AuthConfig { secret: SECRET.to_string() },
            client_base_url: CLIENT_BASE_URL.to_string(),
            metrics: Arc::new(Metrics::new().unwrap()),
        };

        Self { router: app(state), store, gateway }
    }
}

pub fn token(user: &str) -> String {
    issue_token(SECRET, user, "CUSTOMER", 3600).unwrap()
}

pub fn admin_token() -> String {
    issue_token(SECRET, "admin-1", "ADMIN", 3600).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub set_cookie: Vec<String>,
    pub body: Value,
    pub text: String,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let set_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&bytes).to_string();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse { status, location, set_cookie, body, text }
}

pub fn post_json(uri: &str, bearer: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn address() -> Value {
    serde_json::json!({
        "street": "742 Evergreen Terrace",
        "city": "Springfield",
        "country": "US",
        "postalCode": "49007"
    })
}

pub fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

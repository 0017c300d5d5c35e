use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub orders_placed: IntCounter,
    pub order_failures: IntCounterVec,
    pub payments_settled: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_placed = IntCounter::new("shopfront_orders_placed_total", "Orders placed")?;
        let order_failures = IntCounterVec::new(
            Opts::new("shopfront_order_failures_total", "Rejected order placements"),
            &["reason"],
        )?;
        let payments_settled = IntCounterVec::new(
            Opts::new("shopfront_payments_settled_total", "Payment confirmations and cancellations by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(orders_placed.clone()))?;
        registry.register(Box::new(order_failures.clone()))?;
        registry.register(Box::new(payments_settled.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            order_failures,
            payments_settled,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use shopfront_order::{
    CancelOutcome, ConfirmOutcome, Payment, PaymentInitiation, PaymentRecordStatus, PaymentRequest,
    PaymentStatus,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{admin_auth_middleware, customer_auth_middleware, Claims};
use crate::state::AppState;

/// Provider session cookie set while the customer is away at the provider.
pub const PAYMENT_SESSION_COOKIE: &str = "payment_session";

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/payments/pay", post(initiate_payment))
        .route("/payments/{order_id}", get(payment_for_order))
        .route_layer(middleware::from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/payments/all", get(all_payments))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    // Reached by the browser coming back from the provider, so no bearer token
    let provider = Router::new()
        .route("/payments/success", get(payment_success))
        .route("/payments/cancel", get(payment_cancel));

    customer.merge(admin).merge(provider)
}

#[derive(Debug, Deserialize)]
struct ProviderReturn {
    token: Option<String>,
}

async fn initiate_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentInitiation>), AppError> {
    let Json(request) = payload?;
    let started = state.payments.initiate(&claims.sub, request).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn payment_success(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<ProviderReturn>,
) -> Result<Response, AppError> {
    let token = params
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("token is required".into()))?;

    let outcome = state.payments.confirm(&token).await?;
    state.metrics.payments_settled.with_label_values(&[outcome.label()]).inc();

    let order_id = outcome.order_id();
    let path = match outcome {
        ConfirmOutcome::Completed { .. }
        | ConfirmOutcome::AlreadySettled { status: PaymentRecordStatus::Completed, .. }
        | ConfirmOutcome::Superseded { order_payment: PaymentStatus::Completed, .. } => {
            confirmation_path(order_id)
        }
        ConfirmOutcome::Pending { .. }
        | ConfirmOutcome::AlreadySettled { status: PaymentRecordStatus::Pending, .. } => {
            format!("/orders/{}/payment-pending", order_id)
        }
        ConfirmOutcome::Failed { .. }
        | ConfirmOutcome::AlreadySettled { .. }
        | ConfirmOutcome::Superseded { .. } => retry_path(order_id),
    };

    Ok(redirect(&state, jar, &path))
}

async fn payment_cancel(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<ProviderReturn>,
) -> Result<Response, AppError> {
    let outcome = match params.token.filter(|t| !t.trim().is_empty()) {
        Some(token) => state.payments.cancel(&token).await?,
        None => CancelOutcome::NoPayment,
    };

    let path = match outcome {
        CancelOutcome::Cancelled { order_id } => {
            state.metrics.payments_settled.with_label_values(&["cancelled"]).inc();
            retry_path(order_id)
        }
        CancelOutcome::AlreadySettled { order_id, status: PaymentRecordStatus::Completed }
        | CancelOutcome::Superseded { order_id, order_payment: PaymentStatus::Completed } => {
            confirmation_path(order_id)
        }
        CancelOutcome::AlreadySettled { order_id, .. } | CancelOutcome::Superseded { order_id, .. } => {
            retry_path(order_id)
        }
        CancelOutcome::NoPayment => "/checkout".to_string(),
    };

    Ok(redirect(&state, jar, &path))
}

async fn payment_for_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    order_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Payment>, AppError> {
    let Path(order_id) = order_id.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let payment = state
        .payments
        .payment_for_order(&claims.sub, claims.is_admin(), order_id)
        .await?;
    Ok(Json(payment))
}

async fn all_payments(State(state): State<AppState>) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(state.payments.all_payments().await?))
}

fn confirmation_path(order_id: Uuid) -> String {
    format!("/orders/{}/confirmation", order_id)
}

fn retry_path(order_id: Uuid) -> String {
    format!("/orders/{}/payment?retry=true", order_id)
}

/// 302 to the storefront, dropping the stale provider session cookie.
fn redirect(state: &AppState, jar: CookieJar, path: &str) -> Response {
    let location = format!("{}{}", state.client_base_url.trim_end_matches('/'), path);
    let jar = jar.remove(Cookie::build(PAYMENT_SESSION_COOKIE).path("/"));
    (StatusCode::FOUND, jar, [(header::LOCATION, location)]).into_response()
}

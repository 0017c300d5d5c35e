use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    routing::post,
    Extension, Json, Router,
};
use shopfront_order::{Order, PlaceOrderRequest, PlacedOrder};
use tracing::info;

use crate::error::AppError;
use crate::middleware::auth::{customer_auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", post(place_order).get(list_orders))
        .route_layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

async fn place_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlacedOrder>), AppError> {
    let Json(request) = payload.inspect_err(|_| {
        state.metrics.order_failures.with_label_values(&["malformed"]).inc();
    })?;

    match state.placement.place(&claims.sub, request).await {
        Ok(placed) => {
            state.metrics.orders_placed.inc();
            Ok((StatusCode::CREATED, Json(placed)))
        }
        Err(e) => {
            info!("Order rejected for {}: {}", claims.sub, e);
            state.metrics.order_failures.with_label_values(&[e.kind()]).inc();
            Err(e.into())
        }
    }
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.placement.list_for_user(&claims.sub).await?;
    Ok(Json(orders))
}

use rust_decimal::Decimal;
use shopfront_catalog::{CouponError, InventoryError};
use shopfront_core::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Product {product_id} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        product_id: String,
        requested: i32,
        available: i32,
    },

    #[error("Coupon {0} has expired")]
    Expired(String),

    #[error("Payment amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: Decimal, actual: Decimal },

    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    #[error("Payment provider error: {message}")]
    Provider { message: String, rate_limited: bool },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl OrderError {
    pub fn storage(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        OrderError::Storage(e.to_string())
    }

    /// Short label used for failure metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::InvalidInput(_) => "invalid_input",
            OrderError::Unauthenticated => "unauthenticated",
            OrderError::NotFound(_) => "not_found",
            OrderError::OutOfStock { .. } => "out_of_stock",
            OrderError::Expired(_) => "expired",
            OrderError::AmountMismatch { .. } => "amount_mismatch",
            OrderError::InvalidPaymentMethod(_) => "invalid_payment_method",
            OrderError::Provider { .. } => "provider",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::Storage(_) => "storage",
        }
    }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OrderError::InvalidInput(errors.to_string())
    }
}

impl From<InventoryError> for OrderError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::NotFound(id) => OrderError::NotFound(format!("Product {}", id)),
            InventoryError::InsufficientInventory { product_id, requested, available } => {
                OrderError::OutOfStock {
                    product_id: product_id.to_string(),
                    requested,
                    available,
                }
            }
            InventoryError::Storage(msg) => OrderError::Storage(msg),
        }
    }
}

impl From<CouponError> for OrderError {
    fn from(e: CouponError) -> Self {
        match e {
            // An inactive coupon is just as unusable as an expired one.
            CouponError::Inactive(code) | CouponError::Expired(code) => OrderError::Expired(code),
            other => OrderError::InvalidInput(other.to_string()),
        }
    }
}

impl From<GatewayError> for OrderError {
    fn from(e: GatewayError) -> Self {
        OrderError::Provider {
            rate_limited: e.is_rate_limited(),
            message: e.to_string(),
        }
    }
}

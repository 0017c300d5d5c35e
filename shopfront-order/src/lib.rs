pub mod error;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod placement;
pub mod repository;

#[cfg(test)]
mod testing;

pub use error::OrderError;
pub use manager::{OrderManager, OrderTransition};
pub use models::{
    LineItem, Order, OrderStatus, Payment, PaymentMethod, PaymentRecordStatus, PaymentStatus,
    ShippingAddress,
};
pub use orchestrator::{
    CancelOutcome, ConfirmOutcome, MockPaymentGateway, PaymentInitiation, PaymentOrchestrator,
    PaymentRequest,
};
pub use placement::{
    LineRequest, OrderPlacementService, PlaceOrderRequest, PlacedOrder, ShippingAddressInput,
};
pub use repository::{OrderRepository, PaymentRepository};

pub mod events;
pub mod payment;

pub use events::{publish_event, EventPublisher, LogEventPublisher};
pub use payment::{CaptureResult, GatewayError, IntentStatus, PaymentGateway, PaymentIntent};

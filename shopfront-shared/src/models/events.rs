use rust_decimal::Decimal;
use uuid::Uuid;

pub const ORDER_PLACED_TOPIC: &str = "order.placed";
pub const PAYMENT_SETTLED_TOPIC: &str = "payment.settled";
pub const PRODUCT_DEPLETED_TOPIC: &str = "product.depleted";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub user_id: String,
    pub total_amount: Decimal,
    pub item_count: usize,
    pub coupon_id: Option<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentSettledEvent {
    pub order_id: Uuid,
    pub payment_id: Uuid,
    pub payment_method: String,
    pub outcome: String,
    pub amount: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ProductDepletedEvent {
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub timestamp: i64,
}

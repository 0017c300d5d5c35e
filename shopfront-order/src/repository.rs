use async_trait::async_trait;
use uuid::Uuid;

use crate::manager::OrderTransition;
use crate::models::{Order, Payment, PaymentRecordStatus};

/// Repository trait for orders
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the order and its line items together.
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// Newest first.
    async fn list_orders_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// Applies the transition only while the order is still in
    /// `transition.from`. Returns false when another writer got there first.
    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &OrderTransition,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for payment attempts
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create_payment(
        &self,
        payment: &Payment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, Box<dyn std::error::Error + Send + Sync>>;

    /// Most recent attempt for the order.
    async fn find_latest_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Payment>, Box<dyn std::error::Error + Send + Sync>>;

    /// Newest first.
    async fn list_payments(&self) -> Result<Vec<Payment>, Box<dyn std::error::Error + Send + Sync>>;

    /// Compare-and-set on the payment status.
    async fn transition_status(
        &self,
        id: Uuid,
        from: PaymentRecordStatus,
        to: PaymentRecordStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

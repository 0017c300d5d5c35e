use crate::error::OrderError;
use crate::models::{Order, OrderStatus, PaymentStatus};

/// A status change to persist for an order, guarded by the status it was
/// computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTransition {
    pub from: OrderStatus,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Order lifecycle rules shared by placement and payment reconciliation.
pub struct OrderManager;

impl OrderManager {
    /// Orders that arrive with a provider transaction id were paid up front.
    pub fn initial_state(transaction_id: Option<&str>) -> (OrderStatus, PaymentStatus) {
        match transaction_id {
            Some(_) => (OrderStatus::Processing, PaymentStatus::Completed),
            None => (OrderStatus::Pending, PaymentStatus::Pending),
        }
    }

    /// Transition: pending/pending → processing/completed
    pub fn mark_paid(
        order: &Order,
        transaction_id: Option<String>,
    ) -> Result<OrderTransition, OrderError> {
        Self::check(order, OrderStatus::Processing, PaymentStatus::Completed)?;
        Ok(OrderTransition {
            from: order.status,
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Completed,
            transaction_id: transaction_id.or_else(|| order.transaction_id.clone()),
        })
    }

    /// Transition: pending/pending → cancelled/failed
    pub fn mark_payment_failed(order: &Order) -> Result<OrderTransition, OrderError> {
        Self::check(order, OrderStatus::Cancelled, PaymentStatus::Failed)?;
        Ok(OrderTransition {
            from: order.status,
            status: OrderStatus::Cancelled,
            payment_status: PaymentStatus::Failed,
            transaction_id: order.transaction_id.clone(),
        })
    }

    fn check(
        order: &Order,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), OrderError> {
        if !order.payment_status.can_transition_to(payment_status) {
            return Err(OrderError::InvalidTransition {
                from: format!("payment {}", order.payment_status),
                to: format!("payment {}", payment_status),
            });
        }
        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShippingAddress;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            items: vec![],
            shipping_address: ShippingAddress {
                street: "1 Main St".into(),
                city: "Springfield".into(),
                country: "US".into(),
                postal_code: "12345".into(),
            },
            total_amount: dec!(10.00),
            discount: dec!(0),
            coupon_id: None,
            payment_method: None,
            transaction_id: None,
            status,
            payment_status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_initial_state() {
        assert_eq!(
            OrderManager::initial_state(Some("PAYID-1")),
            (OrderStatus::Processing, PaymentStatus::Completed)
        );
        assert_eq!(
            OrderManager::initial_state(None),
            (OrderStatus::Pending, PaymentStatus::Pending)
        );
    }

    #[test]
    fn test_mark_paid_sets_transaction() {
        let o = order(OrderStatus::Pending, PaymentStatus::Pending);
        let t = OrderManager::mark_paid(&o, Some("TX-1".into())).unwrap();
        assert_eq!(t.from, OrderStatus::Pending);
        assert_eq!(t.status, OrderStatus::Processing);
        assert_eq!(t.payment_status, PaymentStatus::Completed);
        assert_eq!(t.transaction_id.as_deref(), Some("TX-1"));
    }

    #[test]
    fn test_settled_order_cannot_settle_again() {
        let paid = order(OrderStatus::Processing, PaymentStatus::Completed);
        assert_matches!(
            OrderManager::mark_payment_failed(&paid),
            Err(OrderError::InvalidTransition { .. })
        );

        let failed = order(OrderStatus::Cancelled, PaymentStatus::Failed);
        assert_matches!(
            OrderManager::mark_paid(&failed, None),
            Err(OrderError::InvalidTransition { .. })
        );
    }
}

//! Shared fakes for the service tests in this crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shopfront_catalog::{Coupon, CouponRepository, Product, ProductRepository, StockDecrement};
use shopfront_core::payment::{CaptureResult, GatewayError, IntentStatus, PaymentGateway, PaymentIntent};
use shopfront_core::LogEventPublisher;
use uuid::Uuid;

use crate::manager::OrderTransition;
use crate::models::{Order, Payment, PaymentRecordStatus};
use crate::orchestrator::PaymentOrchestrator;
use crate::placement::OrderPlacementService;
use crate::repository::{OrderRepository, PaymentRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Default)]
pub struct FakeStore {
    pub products: Mutex<HashMap<Uuid, Product>>,
    pub coupons: Mutex<HashMap<Uuid, Coupon>>,
    pub orders: Mutex<HashMap<Uuid, Order>>,
    pub payments: Mutex<HashMap<Uuid, Payment>>,
    pub fail_order_writes: Mutex<bool>,
    /// Makes every order transition lose its compare-and-set.
    pub stale_transitions: Mutex<bool>,
}

impl FakeStore {
    pub fn add_product(&self, product: Product) -> Uuid {
        let id = product.id;
        self.products.lock().unwrap().insert(id, product);
        id
    }

    pub fn add_coupon(&self, coupon: Coupon) -> Uuid {
        let id = coupon.id;
        self.coupons.lock().unwrap().insert(id, coupon);
        id
    }

    pub fn product(&self, id: Uuid) -> Product {
        self.products.lock().unwrap()[&id].clone()
    }

    pub fn order(&self, id: Uuid) -> Order {
        self.orders.lock().unwrap()[&id].clone()
    }

    pub fn payment(&self, id: Uuid) -> Payment {
        self.payments.lock().unwrap()[&id].clone()
    }
}

#[async_trait]
impl ProductRepository for FakeStore {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<StockDecrement, BoxError> {
        let mut products = self.products.lock().unwrap();
        let Some(product) = products.get_mut(&id) else {
            return Ok(StockDecrement::Missing);
        };
        Ok(match product.take_stock(quantity) {
            Ok(()) => StockDecrement::Applied { remaining: product.stock },
            Err(_) => StockDecrement::Insufficient { available: product.stock },
        })
    }

    async fn restock(&self, id: Uuid, quantity: i32) -> Result<(), BoxError> {
        if let Some(product) = self.products.lock().unwrap().get_mut(&id) {
            product.restock(quantity);
        }
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for FakeStore {
    async fn get_coupon(&self, id: Uuid) -> Result<Option<Coupon>, BoxError> {
        Ok(self.coupons.lock().unwrap().get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, BoxError> {
        Ok(self.coupons.lock().unwrap().values().find(|c| c.code == code).cloned())
    }
}

#[async_trait]
impl OrderRepository for FakeStore {
    async fn create_order(&self, order: &Order) -> Result<(), BoxError> {
        if *self.fail_order_writes.lock().unwrap() {
            return Err("connection reset".into());
        }
        self.orders.lock().unwrap().insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, BoxError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn apply_transition(&self, id: Uuid, transition: &OrderTransition) -> Result<bool, BoxError> {
        if *self.stale_transitions.lock().unwrap() {
            return Ok(false);
        }
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == transition.from => {
                order.status = transition.status;
                order.payment_status = transition.payment_status;
                order.transaction_id = transition.transaction_id.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentRepository for FakeStore {
    async fn create_payment(&self, payment: &Payment) -> Result<(), BoxError> {
        self.payments.lock().unwrap().insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, BoxError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn find_latest_for_order(&self, order_id: Uuid) -> Result<Option<Payment>, BoxError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, BoxError> {
        Ok(self.payments.lock().unwrap().values().cloned().collect())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: PaymentRecordStatus,
        to: PaymentRecordStatus,
    ) -> Result<bool, BoxError> {
        let mut payments = self.payments.lock().unwrap();
        match payments.get_mut(&id) {
            Some(p) if p.status == from => {
                p.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Gateway whose capture answer is scripted per test.
pub struct ScriptedGateway {
    pub capture: Mutex<Vec<Result<IntentStatus, GatewayError>>>,
    pub captures: Mutex<usize>,
}

impl ScriptedGateway {
    pub fn completing() -> Self {
        Self::with(vec![])
    }

    /// Answers are consumed in order, then every capture completes.
    pub fn with(answers: Vec<Result<IntentStatus, GatewayError>>) -> Self {
        Self { capture: Mutex::new(answers), captures: Mutex::new(0) }
    }

    pub fn capture_calls(&self) -> usize {
        *self.captures.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let id = format!("PP-{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            approval_url: Some(format!("https://paypal.test/approve?token={}", id)),
            id,
            order_id,
            amount,
            currency: currency.to_string(),
            status: IntentStatus::Created,
            created_at: chrono::Utc::now(),
        })
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, GatewayError> {
        *self.captures.lock().unwrap() += 1;
        let mut answers = self.capture.lock().unwrap();
        let answer = if answers.is_empty() {
            Ok(IntentStatus::Completed)
        } else {
            answers.remove(0)
        };
        answer.map(|status| CaptureResult { id: intent_id.to_string(), status })
    }
}

pub fn placement(store: &Arc<FakeStore>) -> OrderPlacementService {
    OrderPlacementService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(LogEventPublisher),
    )
}

pub fn orchestrator(store: &Arc<FakeStore>, gateway: Arc<ScriptedGateway>) -> PaymentOrchestrator {
    PaymentOrchestrator::new(gateway, store.clone(), store.clone(), Arc::new(LogEventPublisher), "USD")
}

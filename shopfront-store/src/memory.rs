use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use shopfront_catalog::{Coupon, CouponRepository, Product, ProductRepository, StockDecrement};
use shopfront_order::{
    Order, OrderRepository, OrderTransition, Payment, PaymentRecordStatus, PaymentRepository,
};
use tokio::sync::RwLock;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    coupons: HashMap<Uuid, Coupon>,
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, Payment>,
}

/// Process-local backend for every repository port. Each operation runs under
/// a single write lock, so conditional updates are atomic like their SQL
/// counterparts.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) -> Uuid {
        let id = product.id;
        self.tables.write().await.products.insert(id, product);
        id
    }

    pub async fn insert_coupon(&self, coupon: Coupon) -> Uuid {
        let id = coupon.id;
        self.tables.write().await.coupons.insert(id, coupon);
        id
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<StockDecrement, BoxError> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(StockDecrement::Missing);
        };
        Ok(match product.take_stock(quantity) {
            Ok(()) => StockDecrement::Applied { remaining: product.stock },
            Err(_) => StockDecrement::Insufficient { available: product.stock },
        })
    }

    async fn restock(&self, id: Uuid, quantity: i32) -> Result<(), BoxError> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| format!("product {} not found", id))?;
        product.restock(quantity);
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn get_coupon(&self, id: Uuid) -> Result<Option<Coupon>, BoxError> {
        Ok(self.tables.read().await.coupons.get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, BoxError> {
        let code = Coupon::normalize_code(code);
        Ok(self
            .tables
            .read()
            .await
            .coupons
            .values()
            .find(|c| c.code == code)
            .cloned())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order(&self, order: &Order) -> Result<(), BoxError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(format!("order {} already exists", order.id).into());
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, BoxError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn apply_transition(&self, id: Uuid, transition: &OrderTransition) -> Result<bool, BoxError> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&id) {
            Some(order) if order.status == transition.from => {
                order.status = transition.status;
                order.payment_status = transition.payment_status;
                order.transaction_id = transition.transaction_id.clone();
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create_payment(&self, payment: &Payment) -> Result<(), BoxError> {
        let mut tables = self.tables.write().await;
        if let Some(tx) = payment.transaction_id.as_deref() {
            if tables.payments.values().any(|p| p.transaction_id.as_deref() == Some(tx)) {
                return Err(format!("duplicate transaction id {}", tx).into());
            }
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, BoxError> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn find_latest_for_order(&self, order_id: Uuid) -> Result<Option<Payment>, BoxError> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, BoxError> {
        let mut payments: Vec<Payment> = self.tables.read().await.payments.values().cloned().collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: PaymentRecordStatus,
        to: PaymentRecordStatus,
    ) -> Result<bool, BoxError> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&id) {
            Some(payment) if payment.status == from => {
                payment.status = to;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopfront_order::{
    LineItem, Order, OrderRepository, OrderStatus, OrderTransition, Payment, PaymentMethod,
    PaymentRecordStatus, PaymentRepository, PaymentStatus, ShippingAddress,
};
use sqlx::PgPool;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<LineItem>>, BoxError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, name, quantity, price FROM order_items WHERE order_id = ANY($1) ORDER BY position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for row in rows {
            items.entry(row.order_id).or_default().push(LineItem {
                product_id: row.product_id,
                name: row.name,
                quantity: row.quantity,
                price: row.price,
            });
        }
        Ok(items)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    street: String,
    city: String,
    country: String,
    postal_code: String,
    total_amount: Decimal,
    discount: Decimal,
    coupon_id: Option<Uuid>,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order, BoxError> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items,
            shipping_address: ShippingAddress {
                street: self.street,
                city: self.city,
                country: self.country,
                postal_code: self.postal_code,
            },
            total_amount: self.total_amount,
            discount: self.discount,
            coupon_id: self.coupon_id,
            payment_method: self
                .payment_method
                .as_deref()
                .map(PaymentMethod::from_str)
                .transpose()?,
            transaction_id: self.transaction_id,
            status: OrderStatus::from_str(&self.status)?,
            payment_status: PaymentStatus::from_str(&self.payment_status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    name: String,
    quantity: i32,
    price: Decimal,
}

const ORDER_COLUMNS: &str = "id, user_id, street, city, country, postal_code, total_amount, discount, coupon_id, \
     payment_method, transaction_id, status, payment_status, created_at, updated_at";

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, street, city, country, postal_code, total_amount, discount,
                                coupon_id, payment_method, transaction_id, status, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id)
        .bind(&order.user_id)
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.country)
        .bind(&order.shipping_address.postal_code)
        .bind(order.total_amount)
        .bind(order.discount)
        .bind(order.coupon_id)
        .bind(order.payment_method.map(|m| m.to_string()))
        .bind(&order.transaction_id)
        .bind(order.status.to_string())
        .bind(order.payment_status.to_string())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_id, name, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = self.load_items(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(row.into_order(items)?))
    }

    async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, BoxError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn apply_transition(&self, id: Uuid, transition: &OrderTransition) -> Result<bool, BoxError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, payment_status = $4, transaction_id = $5, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(transition.from.to_string())
        .bind(transition.status.to_string())
        .bind(transition.payment_status.to_string())
        .bind(&transition.transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    user_id: String,
    payment_method: String,
    transaction_id: Option<String>,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = BoxError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            payment_method: PaymentMethod::from_str(&row.payment_method)?,
            transaction_id: row.transaction_id,
            amount: row.amount,
            status: PaymentRecordStatus::from_str(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PAYMENT_COLUMNS: &str =
    "id, order_id, user_id, payment_method, transaction_id, amount, status, created_at, updated_at";

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create_payment(&self, payment: &Payment) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, user_id, payment_method, transaction_id, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(&payment.user_id)
        .bind(payment.payment_method.to_string())
        .bind(&payment.transaction_id)
        .bind(payment.amount)
        .bind(payment.status.to_string())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, BoxError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE transaction_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_latest_for_order(&self, order_id: Uuid) -> Result<Option<Payment>, BoxError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, BoxError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: PaymentRecordStatus,
        to: PaymentRecordStatus,
    ) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

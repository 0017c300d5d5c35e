use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_catalog::{Coupon, CouponRepository, OrderQuote, ProductRepository, StockReservation};
use shopfront_core::{publish_event, EventPublisher};
use shopfront_shared::models::events::{
    OrderPlacedEvent, ProductDepletedEvent, ORDER_PLACED_TOPIC, PRODUCT_DEPLETED_TOPIC,
};
use shopfront_shared::Masked;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::OrderError;
use crate::manager::OrderManager;
use crate::models::{LineItem, Order, PaymentMethod, PaymentStatus, ShippingAddress};
use crate::repository::OrderRepository;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    #[validate(required(message = "productId is required"))]
    pub product_id: Option<Uuid>,
    #[validate(
        required(message = "quantity is required"),
        range(min = 1, message = "quantity must be at least 1")
    )]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    #[validate(required(message = "street is required"), length(min = 1, message = "street is required"))]
    pub street: Option<String>,
    #[validate(required(message = "city is required"), length(min = 1, message = "city is required"))]
    pub city: Option<String>,
    #[validate(required(message = "country is required"), length(min = 1, message = "country is required"))]
    pub country: Option<String>,
    #[validate(required(message = "postalCode is required"), length(min = 1, message = "postalCode is required"))]
    pub postal_code: Option<String>,
}

impl ShippingAddressInput {
    fn into_address(self) -> Result<ShippingAddress, OrderError> {
        fn field(value: Option<String>, name: &str) -> Result<String, OrderError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| OrderError::InvalidInput(format!("shippingAddress.{} is required", name)))
        }

        Ok(ShippingAddress {
            street: field(self.street, "street")?,
            city: field(self.city, "city")?,
            country: field(self.country, "country")?,
            postal_code: field(self.postal_code, "postalCode")?,
        })
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "order must contain at least one item"), nested)]
    pub items: Vec<LineRequest>,
    #[validate(required(message = "shippingAddress is required"), nested)]
    pub shipping_address: Option<ShippingAddressInput>,
    pub coupon_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
}

/// Validates a cart against the catalog, prices it, reserves stock and
/// persists the order. Either every line's stock is taken and the order
/// exists, or nothing changed.
pub struct OrderPlacementService {
    products: Arc<dyn ProductRepository>,
    coupons: Arc<dyn CouponRepository>,
    orders: Arc<dyn OrderRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl OrderPlacementService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        coupons: Arc<dyn CouponRepository>,
        orders: Arc<dyn OrderRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { products, coupons, orders, publisher }
    }

    pub async fn place(
        &self,
        user_id: &str,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder, OrderError> {
        if user_id.trim().is_empty() {
            return Err(OrderError::Unauthenticated);
        }
        request.validate()?;

        let PlaceOrderRequest {
            items,
            shipping_address,
            coupon_id,
            coupon_code,
            payment_method,
            transaction_id,
        } = request;

        let shipping_address = shipping_address
            .ok_or_else(|| OrderError::InvalidInput("shippingAddress is required".into()))?
            .into_address()?;

        let payment_method = payment_method
            .map(|m| {
                m.parse::<PaymentMethod>()
                    .map_err(|_| OrderError::InvalidPaymentMethod(m.clone()))
            })
            .transpose()?;

        let transaction_id = transaction_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        // Resolve every line before touching stock
        let mut quote = OrderQuote::new();
        let mut requests = Vec::with_capacity(items.len());
        for line in &items {
            let (product_id, quantity) = match (line.product_id, line.quantity) {
                (Some(product_id), Some(quantity)) => (product_id, quantity),
                _ => return Err(OrderError::InvalidInput("each item needs productId and quantity".into())),
            };

            let product = self
                .products
                .get_product(product_id)
                .await
                .map_err(OrderError::storage)?
                .ok_or_else(|| OrderError::NotFound(format!("Product {}", product_id)))?;

            if !product.has_stock_for(quantity) {
                return Err(OrderError::OutOfStock {
                    product_id: product_id.to_string(),
                    requested: quantity,
                    available: product.stock,
                });
            }

            quote.add_line(&product, quantity);
            requests.push((product_id, quantity));
        }

        if let Some(coupon) = self.resolve_coupon(coupon_id, coupon_code.as_deref()).await? {
            coupon.ensure_usable_at(Utc::now())?;
            quote.apply_coupon(&coupon);
        }

        let mut reservation = StockReservation::reserve_all(self.products.as_ref(), &requests).await?;

        let (status, payment_status) = OrderManager::initial_state(transaction_id.as_deref());
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            total_amount: quote.total(),
            discount: quote.discount_percent(),
            coupon_id: quote.coupon_id(),
            items: quote
                .into_lines()
                .into_iter()
                .map(|line| LineItem {
                    product_id: line.product_id,
                    name: line.name,
                    quantity: line.quantity,
                    price: line.unit_price,
                })
                .collect(),
            shipping_address,
            payment_method,
            transaction_id,
            status,
            payment_status,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.orders.create_order(&order).await {
            warn!("Failed to persist order {}, releasing stock: {}", order.id, e);
            reservation.release(self.products.as_ref()).await;
            return Err(OrderError::storage(e));
        }

        let depleted = reservation.depleted();
        let reserved = reservation.commit();

        info!(
            "Order {} placed by {}: {} line(s), total {}, ship to {:?}",
            order.id,
            order.user_id,
            reserved.len(),
            order.total_amount,
            Masked(&order.shipping_address)
        );

        self.announce(&order, &depleted).await;

        Ok(PlacedOrder {
            order_id: order.id,
            total_amount: order.total_amount,
            payment_status: order.payment_status,
        })
    }

    /// Orders of one customer, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        if user_id.trim().is_empty() {
            return Err(OrderError::Unauthenticated);
        }
        self.orders
            .list_orders_for_user(user_id)
            .await
            .map_err(OrderError::storage)
    }

    async fn resolve_coupon(
        &self,
        coupon_id: Option<Uuid>,
        coupon_code: Option<&str>,
    ) -> Result<Option<Coupon>, OrderError> {
        let coupon_code = coupon_code.map(str::trim).filter(|c| !c.is_empty());

        match (coupon_id, coupon_code) {
            (Some(_), Some(_)) => Err(OrderError::InvalidInput(
                "provide either couponId or couponCode, not both".into(),
            )),
            (Some(id), None) => self
                .coupons
                .get_coupon(id)
                .await
                .map_err(OrderError::storage)?
                .map(Some)
                .ok_or_else(|| OrderError::NotFound(format!("Coupon {}", id))),
            (None, Some(code)) => {
                let code = Coupon::normalize_code(code);
                self.coupons
                    .find_coupon_by_code(&code)
                    .await
                    .map_err(OrderError::storage)?
                    .map(Some)
                    .ok_or_else(|| OrderError::NotFound(format!("Coupon {}", code)))
            }
            (None, None) => Ok(None),
        }
    }

    async fn announce(&self, order: &Order, depleted: &[Uuid]) {
        let key = order.id.to_string();
        let timestamp = Utc::now().timestamp();

        let placed = OrderPlacedEvent {
            order_id: order.id,
            user_id: order.user_id.clone(),
            total_amount: order.total_amount,
            item_count: order.items.len(),
            coupon_id: order.coupon_id,
            timestamp,
        };
        publish_event(self.publisher.as_ref(), ORDER_PLACED_TOPIC, &key, &placed).await;

        for &product_id in depleted {
            let event = ProductDepletedEvent { product_id, order_id: order.id, timestamp };
            publish_event(self.publisher.as_ref(), PRODUCT_DEPLETED_TOPIC, &product_id.to_string(), &event)
                .await;
        }
    }
}

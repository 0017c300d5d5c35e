use async_trait::async_trait;
use uuid::Uuid;

use crate::coupon::Coupon;
use crate::product::Product;

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    Applied { remaining: i32 },
    Insufficient { available: i32 },
    Missing,
}

/// Repository trait for product catalog access
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product(
        &self,
        id: Uuid,
    ) -> Result<Option<Product>, Box<dyn std::error::Error + Send + Sync>>;

    /// Atomically subtracts `quantity` only when at least that many units are
    /// in stock, clearing `in_stock` when the result is zero.
    async fn decrement_stock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<StockDecrement, Box<dyn std::error::Error + Send + Sync>>;

    async fn restock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for coupon lookups
#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn get_coupon(
        &self,
        id: Uuid,
    ) -> Result<Option<Coupon>, Box<dyn std::error::Error + Send + Sync>>;

    /// `code` is matched after upper-casing.
    async fn find_coupon_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Coupon>, Box<dyn std::error::Error + Send + Sync>>;
}

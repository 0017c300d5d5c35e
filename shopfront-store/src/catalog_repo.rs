use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopfront_catalog::{Coupon, CouponRepository, Product, ProductRepository, StockDecrement};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    discount_applied: bool,
    discounted_price: Option<Decimal>,
    stock: i32,
    in_stock: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price: row.price,
            discount_applied: row.discount_applied,
            discounted_price: row.discounted_price,
            stock: row.stock,
            in_stock: row.in_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount: Decimal,
    expiry_date: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            id: row.id,
            code: row.code,
            discount: row.discount,
            expiry_date: row.expiry_date,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, price, discount_applied, discounted_price, stock, in_stock, created_at, updated_at";

#[async_trait]
impl ProductRepository for PgCatalogRepository {
    async fn get_product(
        &self,
        id: Uuid,
    ) -> Result<Option<Product>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Product::from))
    }

    async fn decrement_stock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<StockDecrement, Box<dyn std::error::Error + Send + Sync>> {
        // Check and decrement in one statement so concurrent orders cannot both pass.
        let remaining: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE products
            SET stock = stock - $2, in_stock = (stock - $2) > 0, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((remaining,)) = remaining {
            return Ok(StockDecrement::Applied { remaining });
        }

        let available: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match available {
            Some((available,)) => StockDecrement::Insufficient { available },
            None => StockDecrement::Missing,
        })
    }

    async fn restock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "UPDATE products SET stock = stock + $2, in_stock = (stock + $2) > 0, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for PgCatalogRepository {
    async fn get_coupon(
        &self,
        id: Uuid,
    ) -> Result<Option<Coupon>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<CouponRow> = sqlx::query_as(
            "SELECT id, code, discount, expiry_date, is_active, created_at FROM coupons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Coupon::from))
    }

    async fn find_coupon_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Coupon>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<CouponRow> = sqlx::query_as(
            "SELECT id, code, discount, expiry_date, is_active, created_at FROM coupons WHERE code = $1",
        )
        .bind(Coupon::normalize_code(code))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Coupon::from))
    }
}

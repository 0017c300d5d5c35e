use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable catalog item.
///
/// `in_stock` is derived from `stock` and is updated in the same step as every
/// stock change, never on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub discount_applied: bool,
    pub discounted_price: Option<Decimal>,
    pub stock: i32,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            price,
            discount_applied: false,
            discounted_price: None,
            stock,
            in_stock: stock > 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Puts the product on sale at `discounted_price`.
    pub fn with_discount(mut self, discounted_price: Decimal) -> Self {
        self.discount_applied = true;
        self.discounted_price = Some(discounted_price);
        self
    }

    /// Checks the catalog invariants: positive price, sale price not above list
    /// price, non-negative stock.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.price <= Decimal::ZERO {
            return Err(ProductError::InvalidPrice(format!(
                "price of {} must be positive",
                self.id
            )));
        }
        if let Some(discounted) = self.discounted_price {
            if discounted > self.price || discounted < Decimal::ZERO {
                return Err(ProductError::InvalidPrice(format!(
                    "discounted price {} of {} must be between 0 and {}",
                    discounted, self.id, self.price
                )));
            }
        }
        if self.stock < 0 {
            return Err(ProductError::NegativeStock(self.id.to_string()));
        }
        Ok(())
    }

    /// Price charged for one unit at this moment.
    pub fn unit_price(&self) -> Decimal {
        match (self.discount_applied, self.discounted_price) {
            (true, Some(discounted)) => discounted,
            _ => self.price,
        }
    }

    pub fn has_stock_for(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }

    /// Decrements stock only if enough units remain.
    pub fn take_stock(&mut self, quantity: i32) -> Result<(), ProductError> {
        if !self.has_stock_for(quantity) {
            return Err(ProductError::InsufficientStock {
                product_id: self.id.to_string(),
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock -= quantity;
        self.in_stock = self.stock > 0;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn restock(&mut self, quantity: i32) {
        self.stock += quantity;
        self.in_stock = self.stock > 0;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Stock of {0} cannot be negative")]
    NegativeStock(String),
}

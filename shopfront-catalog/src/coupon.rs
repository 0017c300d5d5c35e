use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A percentage discount code. Codes are stored upper-case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn new(code: &str, discount: Decimal, expiry_date: DateTime<Utc>) -> Result<Self, CouponError> {
        let code = Self::normalize_code(code);
        if code.is_empty() {
            return Err(CouponError::InvalidCode);
        }
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            return Err(CouponError::InvalidDiscount(discount));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            code,
            discount,
            expiry_date,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// A coupon can be redeemed while it is active and its expiry is still ahead.
    pub fn ensure_usable_at(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive(self.code.clone()));
        }
        if self.expiry_date <= now {
            return Err(CouponError::Expired(self.code.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("Coupon {0} is no longer active")]
    Inactive(String),

    #[error("Coupon {0} has expired")]
    Expired(String),

    #[error("Coupon discount must be between 0 and 100, got {0}")]
    InvalidDiscount(Decimal),

    #[error("Coupon code cannot be empty")]
    InvalidCode,
}

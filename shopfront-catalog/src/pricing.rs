use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_shared::money::{apply_percentage_discount, round_money};
use uuid::Uuid;

use crate::coupon::Coupon;
use crate::product::Product;

/// One resolved order line with its price frozen at quote time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Accumulates order lines and at most one coupon, then yields the frozen
/// total: `round(Σ unit × qty × (1 − discount/100), 2)`.
#[derive(Debug, Clone, Default)]
pub struct OrderQuote {
    lines: Vec<PricedLine>,
    subtotal: Decimal,
    discount_percent: Decimal,
    coupon_id: Option<Uuid>,
}

impl OrderQuote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the product's current unit price for `quantity` units.
    pub fn add_line(&mut self, product: &Product, quantity: i32) -> &PricedLine {
        let line = PricedLine {
            product_id: product.id,
            name: product.name.clone(),
            quantity,
            unit_price: product.unit_price(),
        };
        self.subtotal += line.line_total();
        self.lines.push(line);
        &self.lines[self.lines.len() - 1]
    }

    /// Applies the coupon's percentage to the whole subtotal. A second call
    /// replaces the first coupon rather than stacking.
    pub fn apply_coupon(&mut self, coupon: &Coupon) {
        self.discount_percent = coupon.discount;
        self.coupon_id = Some(coupon.id);
    }

    pub fn lines(&self) -> &[PricedLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<PricedLine> {
        self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        round_money(self.subtotal)
    }

    pub fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }

    pub fn coupon_id(&self) -> Option<Uuid> {
        self.coupon_id
    }

    pub fn total(&self) -> Decimal {
        apply_percentage_discount(self.subtotal, self.discount_percent)
    }
}

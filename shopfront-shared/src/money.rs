use rust_decimal::{Decimal, RoundingStrategy};

/// Money is carried at exactly two decimal places, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `amount` reduced by `percent` (0..=100), rounded to cents.
pub fn apply_percentage_discount(amount: Decimal, percent: Decimal) -> Decimal {
    let hundred = Decimal::ONE_HUNDRED;
    round_money(amount * (hundred - percent) / hundred)
}

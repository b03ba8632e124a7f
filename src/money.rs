//! Decimal money helpers and rounding rules
//!
//! All monetary amounts are `rust_decimal::Decimal`. Computed amounts are
//! rounded to cents, half away from zero. Rates are annual percentages
//! (8.5 means 8.5%).

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Days-per-year convention for simple interest (actual/365)
pub const DAYS_PER_YEAR: Decimal = dec!(365);

/// Decimal places kept on monetary amounts
pub const MONEY_DP: u32 = 2;

/// Round a monetary amount to cents
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a percentage (8.5) to a fraction (0.085)
pub fn pct(rate: Decimal) -> Decimal {
    rate / Decimal::ONE_HUNDRED
}

/// Simple interest on `principal` for `days` at an annual percentage `rate`, actual/365
pub fn simple_interest(principal: Decimal, rate: Decimal, days: u32) -> Decimal {
    round_money(principal * pct(rate) * Decimal::from(days) / DAYS_PER_YEAR)
}

/// Lossy conversion for floating-point analytics (APR solving, reporting)
pub fn to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

/// Convert a float into a decimal, `None` for NaN/infinite input
pub fn from_f64(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value)
}

//! Monetary amounts using decimal arithmetic.
//!
//! The backend stores prices as floats and sends them as JSON numbers. They
//! are decoded into a [`Decimal`] immediately so that line totals and cart
//! sums never accumulate binary floating point error on this side.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency symbol used when rendering prices.
pub const CURRENCY_SYMBOL: &str = "R$";

/// A price in the store's single currency (Brazilian real).
///
/// Deserializes from a JSON number or string; serializes as a JSON number
/// because that is what the backend's request schemas expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display, e.g. `R$ 149.90`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{CURRENCY_SYMBOL} {:.2}", self.0.round_dp(2))
    }
}

impl Serialize for Price {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl core::str::FromStr for Price {
    type Err = rust_decimal::Error;

    /// Parses a user-entered amount. Accepts a comma as decimal separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(',', ".");
        Decimal::from_str_exact(&normalized).map(Self)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rounds_to_cents() {
        assert_eq!(Price::from_cents(14990).display(), "R$ 149.90");
        assert_eq!(Price::from_cents(5).display(), "R$ 0.05");
        let p: Price = "10.005".parse().unwrap();
        assert_eq!(p.display(), "R$ 10.00");
    }

    #[test]
    fn test_decodes_json_number_and_string() {
        let from_number: Price = serde_json::from_str("19.99").unwrap();
        let from_string: Price = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(from_number, Price::from_cents(1999));
        assert_eq!(from_string, Price::from_cents(1999));
    }

    #[test]
    fn test_serializes_as_json_number() {
        let json = serde_json::to_value(Price::from_cents(1999)).unwrap();
        assert!(json.is_number());
        assert!((json.as_f64().unwrap() - 19.99).abs() < 1e-9);
    }

    #[test]
    fn test_line_totals_and_sum() {
        let total: Price = [Price::from_cents(1999) * 3, Price::from_cents(1)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(5998));
    }

    #[test]
    fn test_parse_accepts_comma() {
        let p: Price = "49,90".parse().unwrap();
        assert_eq!(p, Price::from_cents(4990));
        assert!("abc".parse::<Price>().is_err());
    }
}

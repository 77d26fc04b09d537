//! Type-safe non-negative price representation.
//!
//! The catalog's `priceFrom` and offer prices are always non-negative
//! decimal amounts (spec invariant: "priceFrom >= 0"). `Price` enforces that
//! at construction so a negative value can never leak into a buy-box or a
//! facet range bucket.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors constructing a [`Price`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PriceError {
    #[error("price must be non-negative, got {0}")]
    Negative(Decimal),
}

/// A non-negative decimal price, in the catalog's standard unit (dollars,
/// not cents).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// The zero price, used for the buy-box placeholder (spec §4.5 step 3).
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Construct a price, rejecting negative amounts.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Convert to `f64` for embedding in engine-DSL numeric clauses, where
    /// the wire format (JSON) has no decimal type.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0.try_into().unwrap_or(0.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_amounts() {
        let err = Price::new(Decimal::new(-100, 2)).unwrap_err();
        assert_eq!(err, PriceError::Negative(Decimal::new(-100, 2)));
    }

    #[test]
    fn accepts_zero() {
        assert!(Price::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn orders_by_amount() {
        let cheap = Price::new(Decimal::new(999, 2)).unwrap();
        let pricey = Price::new(Decimal::new(1999, 2)).unwrap();
        assert!(cheap < pricey);
    }

    #[test]
    fn displays_two_decimal_places() {
        let price = Price::new(Decimal::new(1999, 2)).unwrap();
        assert_eq!(price.to_string(), "19.99");
    }
}

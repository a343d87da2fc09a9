//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
}

/// A non-negative amount in the store currency's standard unit.
///
/// Serialized as a decimal string so no precision is lost on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price, clamping negative amounts to zero.
    #[must_use]
    pub fn saturating(amount: Decimal) -> Self {
        Self(amount.max(Decimal::ZERO))
    }

    /// The underlying amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price after applying a percentage discount, rounded to cents.
    #[must_use]
    pub fn discounted(&self, discount: DiscountPercent) -> Self {
        let factor = (Decimal::ONE_HUNDRED - discount.value()) / Decimal::ONE_HUNDRED;
        Self(self.0.saturating_mul(factor).round_dp(2))
    }

    /// Price multiplied by a quantity, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// Sum of two prices, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn plus(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
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

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A discount percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Create a discount, clamping the value into `0..=100`.
    #[must_use]
    pub fn clamped(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    /// The percentage value.
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for DiscountPercent {
    fn from(value: Decimal) -> Self {
        Self::clamped(value)
    }
}

impl From<DiscountPercent> for Decimal {
    fn from(discount: DiscountPercent) -> Self {
        discount.0
    }
}

//! Canonical product shape.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::{DiscountPercent, Price};

/// A product as the cart sees it, after upstream normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// List price before discount.
    pub price: Price,
    /// Image URLs in display order (possibly empty).
    pub images: Vec<String>,
    /// Units in stock.
    pub stock: u32,
    /// Percentage discount applied to the list price.
    pub discount_percent: DiscountPercent,
}

impl Product {
    /// Price per unit after the discount.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.price.discounted(self.discount_percent)
    }
}

//! Cart lines, carts and their product-enriched views.
//!
//! A [`Cart`] is an ordered list of [`CartLine`]s with at most one line per
//! `(product_id, variant)` pair. Every mutation goes through
//! [`combine_quantities`] when two lines collide, so the conflict policy lives
//! in exactly one place.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;
use super::product::Product;

/// Quantity conflict policy.
///
/// Two lines for the same `(product_id, variant)` are merged by addition, so a
/// shopper who added the same item on two devices gets the combined quantity.
/// Capping at available stock is not applied here.
#[must_use]
pub const fn combine_quantities(existing: NonZeroU32, incoming: NonZeroU32) -> NonZeroU32 {
    existing.saturating_add(incoming.get())
}

/// Identity of a line within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product the line refers to.
    pub product_id: ProductId,
    /// Variant (e.g., size), if any.
    pub variant: Option<String>,
}

impl LineKey {
    /// Create a new line key.
    #[must_use]
    pub fn new(product_id: ProductId, variant: Option<String>) -> Self {
        Self {
            product_id,
            variant,
        }
    }
}

/// A single desired purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product identity.
    pub product_id: ProductId,
    /// Desired quantity, always at least one.
    pub quantity: NonZeroU32,
    /// Variant such as a size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl CartLine {
    /// Create a new cart line.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, quantity: NonZeroU32, variant: Option<String>) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            variant,
        }
    }

    /// The `(product_id, variant)` identity of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant.clone())
    }

    fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.variant == key.variant
    }
}

/// An ordered cart. Order is insertion order and only matters for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from raw lines, folding duplicate pairs together.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add_line(line);
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |total, line| total.saturating_add(line.quantity.get()))
    }

    /// Find a line by key.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(key))
    }

    /// Append a line, or combine it with an existing line for the same pair.
    pub fn add_line(&mut self, line: CartLine) {
        let key = line.key();
        match self.lines.iter_mut().find(|existing| existing.matches(&key)) {
            Some(existing) => existing.quantity = combine_quantities(existing.quantity, line.quantity),
            None => self.lines.push(line),
        }
    }

    /// Merge every line of `other` into this cart.
    pub fn merge(&mut self, other: Self) {
        for line in other.lines {
            self.add_line(line);
        }
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// Returns `false` if no line matches the key.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: u32) -> bool {
        let Some(position) = self.lines.iter().position(|line| line.matches(key)) else {
            return false;
        };
        match NonZeroU32::new(quantity) {
            Some(quantity) => {
                if let Some(line) = self.lines.get_mut(position) {
                    line.quantity = quantity;
                }
            }
            None => {
                self.lines.remove(position);
            }
        }
        true
    }

    /// Remove a line. Returns `false` if no line matches the key.
    pub fn remove_line(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| !line.matches(key));
        self.lines.len() != before
    }
}

impl FromIterator<CartLine> for Cart {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        Self::from_lines(iter)
    }
}

/// A cart line joined with its product, if the product could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedCartLine {
    /// The underlying line.
    pub line: CartLine,
    /// The product, or `None` if the lookup failed (the line is unresolved).
    pub product: Option<Product>,
}

impl EnrichedCartLine {
    /// A line whose product has not been looked up yet.
    #[must_use]
    pub const fn unresolved(line: CartLine) -> Self {
        Self {
            line,
            product: None,
        }
    }

    /// A line joined with its product.
    #[must_use]
    pub const fn resolved(line: CartLine, product: Product) -> Self {
        Self {
            line,
            product: Some(product),
        }
    }

    /// Whether a product is attached.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.product.is_some()
    }

    /// Discounted unit price times quantity, if resolved.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.product
            .as_ref()
            .map(|product| product.unit_price().times(self.line.quantity.get()))
    }
}

/// A cart whose lines have been joined with product data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedCart {
    /// Lines in cart order.
    pub lines: Vec<EnrichedCartLine>,
}

impl EnrichedCart {
    /// Wrap enriched lines.
    #[must_use]
    pub const fn new(lines: Vec<EnrichedCartLine>) -> Self {
        Self { lines }
    }

    /// An enriched cart with every line still unresolved.
    #[must_use]
    pub fn unresolved(cart: Cart) -> Self {
        Self::new(
            cart.into_lines()
                .into_iter()
                .map(EnrichedCartLine::unresolved)
                .collect(),
        )
    }

    /// Project back to a plain cart (drops product data).
    #[must_use]
    pub fn to_cart(&self) -> Cart {
        self.lines.iter().map(|l| l.line.clone()).collect()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines that have a product attached.
    pub fn resolved_lines(&self) -> impl Iterator<Item = &EnrichedCartLine> {
        self.lines.iter().filter(|l| l.is_resolved())
    }

    /// Number of lines that could not be resolved.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_resolved()).count()
    }

    /// Sum of line totals over resolved lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines
            .iter()
            .filter_map(EnrichedCartLine::line_total)
            .fold(Price::ZERO, |sum, total| sum.plus(total))
    }

    /// Sum of all quantities, resolved or not.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |total, l| total.saturating_add(l.line.quantity.get()))
    }
}

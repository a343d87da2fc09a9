//! Normalization of untyped upstream JSON into core cart types.
//!
//! Upstream catalog and cart services do not agree on a schema: payloads may
//! be wrapped in a generic `data` envelope, a domain-named envelope
//! (`product`, `cart`) or sent bare; prices arrive as strings or numbers;
//! images as URL strings or objects with a `url`. Everything here resolves
//! those shapes into one canonical form.
//!
//! The only fatal outcome is [`NormalizeError::MalformedPayload`], raised when
//! an identity field is missing or a price is not a number. Every other
//! irregularity is repaired with a default and logged.

mod cart;
mod envelope;
mod product;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use cartwheel_core::{Cart, EnrichedCart, Product};

pub use envelope::unwrap_envelope;

/// Errors raised while normalizing upstream payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The payload cannot be turned into the canonical shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl NormalizeError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload(reason.into())
    }
}

/// Converts heterogeneous upstream JSON into canonical products and carts.
#[derive(Debug, Clone)]
pub struct PayloadNormalizer {
    placeholder_image: String,
}

impl PayloadNormalizer {
    /// Create a normalizer that substitutes `placeholder_image` for blank images.
    #[must_use]
    pub fn new(placeholder_image: impl Into<String>) -> Self {
        Self {
            placeholder_image: placeholder_image.into(),
        }
    }

    /// The URL substituted for blank image entries.
    #[must_use]
    pub fn placeholder_image(&self) -> &str {
        &self.placeholder_image
    }

    /// Normalize a product record in any supported envelope.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MalformedPayload`] if no `id` can be found or
    /// the price is not a number.
    pub fn normalize_product(&self, raw: &Value) -> Result<Product, NormalizeError> {
        let payload = unwrap_envelope(raw, "product");
        product::normalize(payload, &self.placeholder_image)
    }

    /// Normalize a cart response into plain cart lines.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MalformedPayload`] if any line lacks a
    /// product identity.
    pub fn normalize_cart_response(&self, raw: &Value) -> Result<Cart, NormalizeError> {
        Ok(self.normalize_enriched_cart(raw)?.to_cart())
    }

    /// Normalize a cart response, keeping any product data embedded per line.
    ///
    /// Lines whose embedded product cannot be normalized are kept unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MalformedPayload`] if any line lacks a
    /// product identity.
    pub fn normalize_enriched_cart(&self, raw: &Value) -> Result<EnrichedCart, NormalizeError> {
        let payload = unwrap_envelope(raw, "cart");
        cart::normalize(payload, &self.placeholder_image)
    }
}

// =============================================================================
// Field helpers
// =============================================================================

/// First present, non-null field among `keys`.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Read an identifier that may be a string, a number, or an `{"$oid": ...}` object.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(object) => object.get("$oid").and_then(identifier),
        _ => None,
    }
}

/// Outcome of coercing a JSON value to a decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Numeric {
    /// A usable number.
    Value(Decimal),
    /// Absent or blank.
    Missing,
    /// Present but not a number.
    NotANumber,
}

/// Coerce a string-or-number JSON value to a decimal.
fn numeric(value: Option<&Value>) -> Numeric {
    match value {
        None | Some(Value::Null) => Numeric::Missing,
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) if s.trim().is_empty() => Numeric::Missing,
        Some(Value::String(s)) => parse_decimal(s.trim()),
        Some(_) => Numeric::NotANumber,
    }
}

fn parse_decimal(text: &str) -> Numeric {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_or(Numeric::NotANumber, Numeric::Value)
}

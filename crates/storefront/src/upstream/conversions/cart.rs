//! Cart response normalization.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use tracing::warn;

use cartwheel_core::{CartLine, EnrichedCart, EnrichedCartLine, ProductId, combine_quantities};

use super::{NormalizeError, Numeric, field, identifier, numeric, product};

const LINE_LIST_FIELDS: &[&str] = &["lines", "items", "cartItems", "cart_items"];
const PRODUCT_ID_FIELDS: &[&str] = &["productId", "product_id", "product"];
const VARIANT_FIELDS: &[&str] = &["variant", "size"];

/// Normalize an already-unwrapped cart payload.
///
/// The payload may be a bare array of lines or an object carrying one.
pub(super) fn normalize(payload: &Value, placeholder: &str) -> Result<EnrichedCart, NormalizeError> {
    let entries: &[Value] = match payload {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(object) => match field(object, LINE_LIST_FIELDS) {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(other) => {
                return Err(NormalizeError::malformed(format!(
                    "cart lines are not a list: {other}"
                )));
            }
            None => {
                warn!("Cart payload has no line list, treating as empty");
                &[]
            }
        },
        other => {
            return Err(NormalizeError::malformed(format!(
                "cart payload is not an object or list: {other}"
            )));
        }
    };

    let mut lines: Vec<EnrichedCartLine> = Vec::with_capacity(entries.len());
    for entry in entries {
        let enriched = normalize_line(entry, placeholder)?;
        let key = enriched.line.key();
        match lines.iter_mut().find(|existing| existing.line.key() == key) {
            Some(existing) => {
                existing.line.quantity =
                    combine_quantities(existing.line.quantity, enriched.line.quantity);
                if existing.product.is_none() {
                    existing.product = enriched.product;
                }
            }
            None => lines.push(enriched),
        }
    }

    Ok(EnrichedCart::new(lines))
}

fn normalize_line(entry: &Value, placeholder: &str) -> Result<EnrichedCartLine, NormalizeError> {
    let object = entry
        .as_object()
        .ok_or_else(|| NormalizeError::malformed(format!("cart line is not an object: {entry}")))?;

    let product_id = line_product_id(object)
        .map(ProductId::new)
        .ok_or_else(|| NormalizeError::malformed("cart line has no product id"))?;

    let quantity = quantity(object, &product_id);

    let variant = match field(object, VARIANT_FIELDS) {
        Some(Value::String(v)) => Some(v.trim().to_string()).filter(|v| !v.is_empty()),
        Some(other) => Some(other.to_string()),
        None => None,
    };

    let line = CartLine {
        product_id,
        quantity,
        variant,
    };

    // Server-side carts embed the product; only a record carrying a price is
    // treated as enrichment, a bare reference is left for the catalog lookup.
    let embedded = object
        .get("product")
        .filter(|p| p.as_object().is_some_and(|p| p.contains_key("price")));
    let product = match embedded {
        Some(raw) => match product::normalize(raw, placeholder) {
            Ok(product) => Some(product),
            Err(err) => {
                warn!(product_id = %line.product_id, error = %err, "Embedded product is malformed");
                None
            }
        },
        None => None,
    };

    Ok(EnrichedCartLine { line, product })
}

/// Product id from a flat field or a nested product object.
fn line_product_id(object: &Map<String, Value>) -> Option<String> {
    match field(object, PRODUCT_ID_FIELDS)? {
        Value::Object(product) => field(product, &["id", "_id"]).and_then(identifier),
        other => identifier(other),
    }
}

fn quantity(object: &Map<String, Value>, product_id: &ProductId) -> NonZeroU32 {
    let parsed = match numeric(field(object, &["quantity", "qty"])) {
        Numeric::Value(q) => q.trunc().max(Decimal::ZERO).to_u32().or(Some(u32::MAX)),
        Numeric::Missing => {
            warn!(%product_id, "Cart line has no quantity, defaulting to one");
            None
        }
        Numeric::NotANumber => {
            warn!(%product_id, "Cart line quantity is not a number, defaulting to one");
            None
        }
    };
    parsed.and_then(NonZeroU32::new).unwrap_or(NonZeroU32::MIN)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::super::PayloadNormalizer;
    use super::*;
    use cartwheel_core::Cart;

    fn normalizer() -> PayloadNormalizer {
        PayloadNormalizer::new("/img/none.png")
    }

    fn qty(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_cart_envelopes_normalize_identically() {
        let lines = json!([{"productId": "p1", "quantity": 2, "size": "M"}]);
        let expected = Cart::from_lines([CartLine::new("p1", qty(2), Some("M".into()))]);

        for raw in [
            lines.clone(),
            json!({"data": {"items": lines.clone()}}),
            json!({"cart": {"lines": lines.clone()}}),
            json!({"data": lines.clone()}),
        ] {
            assert_eq!(normalizer().normalize_cart_response(&raw).unwrap(), expected);
        }
    }

    #[test]
    fn test_embedded_product_resolves_line() {
        let raw = json!({"cart": {"items": [
            {"product": {"_id": "p1", "name": "Hat", "price": "10"}, "quantity": "3"},
            {"product": "p2", "quantity": 1}
        ]}});
        let cart = normalizer().normalize_enriched_cart(&raw).unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert!(cart.lines[0].is_resolved());
        assert_eq!(cart.lines[0].line.quantity, qty(3));
        assert!(!cart.lines[1].is_resolved());
        assert_eq!(cart.lines[1].line.product_id.as_str(), "p2");
    }

    #[test]
    fn test_product_reference_without_price_stays_unresolved() {
        let raw = json!([{"product": {"_id": "p1"}, "quantity": 1}]);
        let cart = normalizer().normalize_enriched_cart(&raw).unwrap();
        assert_eq!(cart.unresolved_count(), 1);
    }

    #[test]
    fn test_malformed_embedded_product_keeps_line() {
        let raw = json!([{"productId": "p1", "product": {"_id": "p1", "price": "n/a"}, "quantity": 1}]);
        let cart = normalizer().normalize_enriched_cart(&raw).unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.unresolved_count(), 1);
    }

    #[test]
    fn test_line_without_product_id_is_malformed() {
        let raw = json!({"lines": [{"quantity": 1}]});
        let result = normalizer().normalize_cart_response(&raw);
        assert!(matches!(result, Err(NormalizeError::MalformedPayload(_))));
    }

    #[test]
    fn test_bad_quantities_default_to_one() {
        let raw = json!([
            {"productId": "a", "quantity": 0},
            {"productId": "b", "quantity": "lots"},
            {"productId": "c"}
        ]);
        let cart = normalizer().normalize_cart_response(&raw).unwrap();
        assert!(cart.lines().iter().all(|l| l.quantity == NonZeroU32::MIN));
        assert_eq!(cart.len(), 3);
    }

    #[test]
    fn test_duplicate_pairs_are_folded() {
        let raw = json!([
            {"productId": "a", "quantity": 1},
            {"productId": "a", "quantity": 2},
            {"productId": "a", "quantity": 1, "variant": "XL"}
        ]);
        let cart = normalizer().normalize_cart_response(&raw).unwrap();
        assert_eq!(
            cart.lines(),
            &[
                CartLine::new("a", qty(3), None),
                CartLine::new("a", qty(1), Some("XL".into())),
            ]
        );
    }

    #[test]
    fn test_missing_line_list_is_empty_cart() {
        let cart = normalizer()
            .normalize_cart_response(&json!({"cart": {"owner": "u1"}}))
            .unwrap();
        assert!(cart.is_empty());
    }
}

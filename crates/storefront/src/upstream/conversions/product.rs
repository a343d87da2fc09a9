//! Product record normalization.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use tracing::warn;

use cartwheel_core::{DiscountPercent, Price, Product, ProductId};

use super::{NormalizeError, Numeric, field, identifier, numeric};

const ID_FIELDS: &[&str] = &["id", "_id", "productId", "product_id"];
const NAME_FIELDS: &[&str] = &["name", "title"];
const PRICE_FIELDS: &[&str] = &["price"];
const STOCK_FIELDS: &[&str] = &["stock", "countInStock", "count_in_stock", "inventory"];
const DISCOUNT_FIELDS: &[&str] = &["discountPercent", "discount_percent", "discount"];

/// Normalize an already-unwrapped product payload.
pub(super) fn normalize(payload: &Value, placeholder: &str) -> Result<Product, NormalizeError> {
    let object = payload
        .as_object()
        .ok_or_else(|| NormalizeError::malformed("product payload is not an object"))?;

    let id = field(object, ID_FIELDS)
        .and_then(identifier)
        .map(ProductId::new)
        .ok_or_else(|| NormalizeError::malformed("product has no id"))?;

    let name = match field(object, NAME_FIELDS) {
        Some(Value::String(name)) => name.trim().to_string(),
        Some(other) => {
            warn!(product_id = %id, value = %other, "Product name is not a string");
            other.to_string()
        }
        None => {
            warn!(product_id = %id, "Product has no name");
            String::new()
        }
    };

    Ok(Product {
        price: price(object, &id)?,
        images: images(object, placeholder),
        stock: stock(object, &id),
        discount_percent: discount(object, &id),
        id,
        name,
    })
}

fn price(object: &Map<String, Value>, id: &ProductId) -> Result<Price, NormalizeError> {
    match numeric(field(object, PRICE_FIELDS)) {
        Numeric::Value(amount) => {
            if amount.is_sign_negative() && !amount.is_zero() {
                warn!(product_id = %id, %amount, "Negative product price clamped to zero");
            }
            Ok(Price::saturating(amount))
        }
        Numeric::Missing => {
            warn!(product_id = %id, "Product has no price, defaulting to zero");
            Ok(Price::ZERO)
        }
        Numeric::NotANumber => Err(NormalizeError::malformed(format!(
            "product {id} has a non-numeric price"
        ))),
    }
}

fn stock(object: &Map<String, Value>, id: &ProductId) -> u32 {
    match numeric(field(object, STOCK_FIELDS)) {
        Numeric::Value(units) => units.trunc().max(Decimal::ZERO).to_u32().unwrap_or(u32::MAX),
        Numeric::Missing => 0,
        Numeric::NotANumber => {
            warn!(product_id = %id, "Product stock is not a number, defaulting to zero");
            0
        }
    }
}

fn discount(object: &Map<String, Value>, id: &ProductId) -> DiscountPercent {
    match numeric(field(object, DISCOUNT_FIELDS)) {
        Numeric::Value(percent) => DiscountPercent::clamped(percent),
        Numeric::Missing => DiscountPercent::NONE,
        Numeric::NotANumber => {
            warn!(product_id = %id, "Product discount is not a number, ignoring it");
            DiscountPercent::NONE
        }
    }
}

/// Image URLs from `images` (strings or `{url}` objects) or a lone `image`.
fn images(object: &Map<String, Value>, placeholder: &str) -> Vec<String> {
    match field(object, &["images"]) {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| image_url(entry).unwrap_or_else(|| placeholder.to_string()))
            .collect(),
        Some(single) => vec![image_url(single).unwrap_or_else(|| placeholder.to_string())],
        None => field(object, &["image"])
            .map(|single| vec![image_url(single).unwrap_or_else(|| placeholder.to_string())])
            .unwrap_or_default(),
    }
}

fn image_url(entry: &Value) -> Option<String> {
    match entry {
        Value::String(url) => Some(url.trim().to_string()).filter(|u| !u.is_empty()),
        Value::Object(object) => object.get("url").and_then(image_url),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::super::PayloadNormalizer;
    use super::*;

    const PLACEHOLDER: &str = "/img/none.png";

    fn normalizer() -> PayloadNormalizer {
        PayloadNormalizer::new(PLACEHOLDER)
    }

    fn canonical() -> Value {
        json!({
            "_id": "p1",
            "name": "Linen Shirt",
            "price": "49.90",
            "images": [{"url": "https://cdn/a.jpg"}, "https://cdn/b.jpg"],
            "countInStock": 7,
            "discount": 10
        })
    }

    #[test]
    fn test_all_envelopes_normalize_identically() {
        let bare = normalizer().normalize_product(&canonical()).unwrap();
        let generic = normalizer()
            .normalize_product(&json!({"data": canonical()}))
            .unwrap();
        let domain = normalizer()
            .normalize_product(&json!({"product": canonical(), "success": true}))
            .unwrap();

        assert_eq!(bare, generic);
        assert_eq!(bare, domain);
        assert_eq!(bare.id.as_str(), "p1");
        assert_eq!(bare.name, "Linen Shirt");
        assert_eq!(bare.price.amount(), Decimal::new(4990, 2));
        assert_eq!(bare.images, vec!["https://cdn/a.jpg", "https://cdn/b.jpg"]);
        assert_eq!(bare.stock, 7);
        assert_eq!(bare.discount_percent.value(), Decimal::new(10, 0));
    }

    #[test]
    fn test_numeric_price_accepted() {
        let product = normalizer()
            .normalize_product(&json!({"id": 42, "price": 12.5}))
            .unwrap();
        assert_eq!(product.id.as_str(), "42");
        assert_eq!(product.price.amount(), Decimal::new(125, 1));
    }

    #[test]
    fn test_non_numeric_price_is_malformed() {
        let result = normalizer().normalize_product(&json!({"id": "p1", "price": "free"}));
        assert!(matches!(result, Err(NormalizeError::MalformedPayload(_))));

        let result = normalizer().normalize_product(&json!({"id": "p1", "price": [1]}));
        assert!(matches!(result, Err(NormalizeError::MalformedPayload(_))));
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let result = normalizer().normalize_product(&json!({"data": {"name": "x", "price": 1}}));
        assert!(matches!(result, Err(NormalizeError::MalformedPayload(_))));

        let result = normalizer().normalize_product(&json!({"id": "  ", "price": 1}));
        assert!(matches!(result, Err(NormalizeError::MalformedPayload(_))));
    }

    #[test]
    fn test_blank_images_replaced_with_placeholder() {
        let product = normalizer()
            .normalize_product(&json!({
                "id": "p1",
                "price": 1,
                "images": ["", {"url": ""}, {"alt": "no url"}, null, "https://cdn/ok.jpg"]
            }))
            .unwrap();
        assert_eq!(
            product.images,
            vec![PLACEHOLDER, PLACEHOLDER, PLACEHOLDER, PLACEHOLDER, "https://cdn/ok.jpg"]
        );
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let product = normalizer().normalize_product(&json!({"id": "p9"})).unwrap();
        assert_eq!(product.name, "");
        assert_eq!(product.price, Price::ZERO);
        assert!(product.images.is_empty());
        assert_eq!(product.stock, 0);
        assert_eq!(product.discount_percent, DiscountPercent::NONE);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let product = normalizer()
            .normalize_product(&json!({
                "id": "p1",
                "price": "-3",
                "stock": -4,
                "discountPercent": "250"
            }))
            .unwrap();
        assert_eq!(product.price, Price::ZERO);
        assert_eq!(product.stock, 0);
        assert_eq!(product.discount_percent.value(), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_single_image_field() {
        let product = normalizer()
            .normalize_product(&json!({"id": "p1", "price": 1, "image": "https://cdn/one.jpg"}))
            .unwrap();
        assert_eq!(product.images, vec!["https://cdn/one.jpg"]);
    }

    #[test]
    fn test_object_id_form() {
        let product = normalizer()
            .normalize_product(&json!({"_id": {"$oid": "65f0"}, "price": 1}))
            .unwrap();
        assert_eq!(product.id.as_str(), "65f0");
    }
}

//! Envelope resolution over untyped upstream responses.

use serde_json::Value;

/// Generic wrapper field used by most upstream endpoints.
pub const GENERIC_WRAPPER: &str = "data";

/// Locate the payload inside `raw`.
///
/// Resolution order: the generic wrapper, then the domain-named field, then
/// the input itself. A wrapper only counts if it holds an object or array.
#[must_use]
pub fn unwrap_envelope<'a>(raw: &'a Value, domain_key: &str) -> &'a Value {
    if let Some(object) = raw.as_object() {
        if let Some(inner) = object.get(GENERIC_WRAPPER).filter(|v| is_payload(v)) {
            return inner;
        }
        if let Some(inner) = object.get(domain_key).filter(|v| is_payload(v)) {
            return inner;
        }
    }
    raw
}

fn is_payload(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_generic_wrapper_wins_over_domain_field() {
        let raw = json!({"data": {"id": "a"}, "product": {"id": "b"}});
        assert_eq!(unwrap_envelope(&raw, "product"), &json!({"id": "a"}));
    }

    #[test]
    fn test_domain_field_used_when_no_generic_wrapper() {
        let raw = json!({"product": {"id": "b"}, "status": "ok"});
        assert_eq!(unwrap_envelope(&raw, "product"), &json!({"id": "b"}));
    }

    #[test]
    fn test_null_wrapper_falls_through() {
        let raw = json!({"data": null, "id": "c"});
        assert_eq!(unwrap_envelope(&raw, "product"), &raw);
    }

    #[test]
    fn test_scalar_domain_field_is_not_an_envelope() {
        // A cart line's `product` may be a plain id string.
        let raw = json!({"product": "p1", "quantity": 2});
        assert_eq!(unwrap_envelope(&raw, "product"), &raw);
    }

    #[test]
    fn test_bare_list_is_its_own_payload() {
        let raw = json!([{"productId": "p1"}]);
        assert_eq!(unwrap_envelope(&raw, "cart"), &raw);
    }
}

//! Integration tests for checkout and the wishlist.

use std::str::FromStr;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use cartwheel_integration_tests::{TestApp, VALID_TOKEN, cart_lines, product_json, view_lines};

fn decimal(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal string")).expect("decimal")
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_guest_checkout_submits_and_clears_cart() {
    let mut app = TestApp::new();
    app.catalog.insert("p1", product_json("p1", "12.50"));
    app.add("p1", 2, None).await;

    let (_, view) = app.get("/cart", None).await;
    assert_eq!(decimal(&view["subtotal"]), Decimal::new(25, 0));

    let (status, outcome) = app.post("/checkout", None, json!({})).await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {outcome}");
    assert_eq!(outcome["intent"]["id"], "pi_test_1");
    assert_eq!(outcome["intent"]["client_secret"], "pi_test_1_secret");
    assert_eq!(outcome["omitted_lines"], 0);

    let requests = app.payments.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].lines.len(), 1);
    assert_eq!(requests[0].lines[0].product_id.as_str(), "p1");
    assert_eq!(requests[0].lines[0].quantity.get(), 2);

    let (_, count) = app.get("/cart/count", None).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn test_authenticated_checkout_clears_remote_cart() {
    let mut app = TestApp::new();
    app.catalog.insert("p1", product_json("p1", "5"));
    app.add("p1", 3, Some(VALID_TOKEN)).await;

    let (status, _) = app.post("/checkout", Some(VALID_TOKEN), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.cart_service.cart(VALID_TOKEN).is_empty());
    assert_eq!(app.payments.requests()[0].lines[0].quantity.get(), 3);
}

#[tokio::test]
async fn test_checkout_omits_lines_with_malformed_products() {
    let mut app = TestApp::new();
    app.catalog.insert("p1", product_json("p1", "10"));
    app.catalog
        .insert("p2", json!({"data": {"_id": "p2", "name": "Broken", "price": "n/a"}}));
    app.add("p1", 1, None).await;
    app.add("p2", 4, None).await;

    let (_, view) = app.get("/cart", None).await;
    assert_eq!(view["unresolved"], 1);
    assert!(view["lines"][1]["product"].is_null());
    assert_eq!(decimal(&view["subtotal"]), Decimal::new(10, 0));

    let (status, outcome) = app.post("/checkout", None, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["omitted_lines"], 1);

    let requests = app.payments.requests();
    let ids: Vec<&str> = requests[0]
        .lines
        .iter()
        .map(|l| l.product_id.as_str())
        .collect();
    assert_eq!(ids, vec!["p1"]);
}

#[tokio::test]
async fn test_checkout_with_only_unresolved_lines_is_empty_checkout() {
    let mut app = TestApp::new();
    app.catalog
        .insert("p2", json!({"product": {"_id": "p2", "price": {"amount": 3}}}));
    app.add("p2", 1, None).await;

    let (status, body) = app.post("/checkout", None, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());
    assert!(app.payments.requests().is_empty());

    let (_, view) = app.get("/cart", None).await;
    assert_eq!(view_lines(&view), vec![("p2".to_string(), 1)]);
}

#[tokio::test]
async fn test_empty_cart_checkout_is_rejected() {
    let mut app = TestApp::new();
    let (status, _) = app.post("/checkout", None, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.payments.requests().is_empty());
}

#[tokio::test]
async fn test_rejected_checkout_leaves_cart_unchanged() {
    let mut app = TestApp::new();
    app.catalog.insert("p1", product_json("p1", "10"));
    app.add("p1", 2, Some(VALID_TOKEN)).await;
    let before = app.cart_service.cart(VALID_TOKEN);

    app.payments.reject(Some("Your card was declined."));
    let (status, body) = app.post("/checkout", Some(VALID_TOKEN), json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Your card was declined.");
    assert_eq!(app.cart_service.cart(VALID_TOKEN), before);
    assert_eq!(cart_lines(&before), vec![("p1".to_string(), 2)]);

    app.payments.reject(None);
    let (status, _) = app.post("/checkout", Some(VALID_TOKEN), json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_guest_checkout_keeps_guest_cart() {
    let mut app = TestApp::new();
    app.catalog.insert("p1", product_json("p1", "10"));
    app.add("p1", 1, None).await;

    app.payments.reject(Some("Payment service unavailable"));
    let (status, _) = app.post("/checkout", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, count) = app.get("/cart/count", None).await;
    assert_eq!(count["count"], 1);
}

// ============================================================================
// Wishlist
// ============================================================================

#[tokio::test]
async fn test_wishlist_toggle() {
    let mut app = TestApp::new();

    let (status, list) = app.get("/wishlist", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));

    let (_, body) = app
        .post("/wishlist/toggle", None, json!({"product_id": "p1"}))
        .await;
    assert_eq!(body["saved"], true);
    app.post("/wishlist/toggle", None, json!({"product_id": "p2"}))
        .await;

    let (_, list) = app.get("/wishlist", None).await;
    assert_eq!(list, json!(["p1", "p2"]));

    let (_, body) = app
        .post("/wishlist/toggle", None, json!({"product_id": "p1"}))
        .await;
    assert_eq!(body["saved"], false);
    assert_eq!(body["wishlist"], json!(["p2"]));
}

#[tokio::test]
async fn test_wishlist_is_independent_of_cart() {
    let mut app = TestApp::new();
    app.post("/wishlist/toggle", None, json!({"product_id": "p1"}))
        .await;
    app.add("p2", 1, None).await;
    app.post("/checkout", None, json!({})).await;

    let (_, list) = app.get("/wishlist", None).await;
    assert_eq!(list, json!(["p1"]));
}

//! Integration tests for Cartwheel.
//!
//! The storefront router is driven in-process with `tower::ServiceExt::oneshot`
//! against in-memory upstreams, so no server or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let mut app = TestApp::new();
//! let (status, body) = app.get("/cart/count", None).await;
//! assert_eq!(status, StatusCode::OK);
//! assert_eq!(body["count"], 0);
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use cartwheel_core::{
    Cart, CartLine, CheckoutIntentId, CheckoutIntentRequest, CheckoutIntentResult, CheckoutStatus,
    EnrichedCart, LineKey, Product, ProductId,
};
use cartwheel_storefront::config::{StorefrontConfig, UpstreamConfig};
use cartwheel_storefront::middleware::SESSION_COOKIE_NAME;
use cartwheel_storefront::models::SessionToken;
use cartwheel_storefront::state::AppState;
use cartwheel_storefront::upstream::{
    PaymentIntents, PayloadNormalizer, ProductCatalog, RemoteCart, UpstreamError,
};

/// Token the fake cart service accepts.
pub const VALID_TOKEN: &str = "tok_valid";

/// Token the fake cart service rejects as expired.
pub const EXPIRED_TOKEN: &str = "tok_expired";

/// Catalog JSON for a well-formed product, wrapped in the `product` envelope.
#[must_use]
pub fn product_json(id: &str, price: &str) -> Value {
    json!({"product": {"_id": id, "name": id.to_uppercase(), "price": price, "countInStock": 5}})
}

// =============================================================================
// Fake cart service
// =============================================================================

/// Account cart service keyed by session token.
pub struct FakeCartService {
    carts: Mutex<HashMap<String, Cart>>,
    rejected: HashSet<String>,
    fail_with: Mutex<Option<u16>>,
    merge_calls: Mutex<usize>,
    merge_delay: Mutex<Option<Duration>>,
}

impl Default for FakeCartService {
    fn default() -> Self {
        Self {
            carts: Mutex::new(HashMap::new()),
            rejected: HashSet::from([EXPIRED_TOKEN.to_string()]),
            fail_with: Mutex::new(None),
            merge_calls: Mutex::new(0),
            merge_delay: Mutex::new(None),
        }
    }
}

impl FakeCartService {
    /// Seed the cart stored for `token`.
    pub fn seed(&self, token: &str, lines: impl IntoIterator<Item = CartLine>) {
        self.carts
            .lock()
            .unwrap()
            .insert(token.to_string(), Cart::from_lines(lines));
    }

    /// The cart stored for `token`.
    #[must_use]
    pub fn cart(&self, token: &str) -> Cart {
        self.carts
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of merge requests received.
    #[must_use]
    pub fn merges(&self) -> usize {
        *self.merge_calls.lock().unwrap()
    }

    /// Hold every merge for `delay` before applying it.
    pub fn delay_merges(&self, delay: Duration) {
        *self.merge_delay.lock().unwrap() = Some(delay);
    }

    /// Make every call fail with `status`, or recover with `None`.
    pub fn fail(&self, status: Option<u16>) {
        *self.fail_with.lock().unwrap() = status;
    }

    fn authorize(&self, token: &SessionToken) -> Result<String, UpstreamError> {
        if self.rejected.contains(token.expose()) {
            return Err(UpstreamError::Unauthorized);
        }
        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Err(UpstreamError::Status {
                status,
                message: "cart service unavailable".into(),
            });
        }
        Ok(token.expose().to_string())
    }

    fn update(
        &self,
        token: &SessionToken,
        apply: impl FnOnce(&mut Cart),
    ) -> Result<EnrichedCart, UpstreamError> {
        let key = self.authorize(token)?;
        let mut carts = self.carts.lock().unwrap();
        let cart = carts.entry(key).or_default();
        apply(cart);
        Ok(EnrichedCart::unresolved(cart.clone()))
    }
}

#[async_trait]
impl RemoteCart for FakeCartService {
    async fn fetch(&self, token: &SessionToken) -> Result<EnrichedCart, UpstreamError> {
        self.update(token, |_| {})
    }

    async fn merge_lines(
        &self,
        token: &SessionToken,
        lines: &[CartLine],
    ) -> Result<EnrichedCart, UpstreamError> {
        *self.merge_calls.lock().unwrap() += 1;
        let delay = *self.merge_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.update(token, |cart| cart.merge(Cart::from_lines(lines.iter().cloned())))
    }

    async fn set_quantity(
        &self,
        token: &SessionToken,
        key: &LineKey,
        quantity: u32,
    ) -> Result<EnrichedCart, UpstreamError> {
        self.update(token, |cart| {
            cart.set_quantity(key, quantity);
        })
    }

    async fn remove_line(
        &self,
        token: &SessionToken,
        key: &LineKey,
    ) -> Result<EnrichedCart, UpstreamError> {
        self.update(token, |cart| {
            cart.remove_line(key);
        })
    }

    async fn clear(&self, token: &SessionToken) -> Result<(), UpstreamError> {
        self.update(token, |cart| *cart = Cart::new()).map(|_| ())
    }
}

// =============================================================================
// Fake catalog
// =============================================================================

/// Catalog serving raw JSON through the real normalizer.
pub struct FakeCatalog {
    records: Mutex<HashMap<String, Value>>,
    normalizer: PayloadNormalizer,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            normalizer: PayloadNormalizer::new("/img/placeholder.png"),
        }
    }
}

impl FakeCatalog {
    /// Serve `raw` for product `id`.
    pub fn insert(&self, id: &str, raw: Value) {
        self.records.lock().unwrap().insert(id.to_string(), raw);
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn fetch_product(&self, id: &ProductId) -> Result<Product, UpstreamError> {
        let raw = self
            .records
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| UpstreamError::Status {
                status: 404,
                message: "Product not found".into(),
            })?;
        Ok(self.normalizer.normalize_product(&raw)?)
    }
}

// =============================================================================
// Fake payment service
// =============================================================================

/// Payment-intent service that records what it receives.
#[derive(Default)]
pub struct FakePayments {
    requests: Mutex<Vec<CheckoutIntentRequest>>,
    reject_with: Mutex<Option<String>>,
}

impl FakePayments {
    /// Reject every request with `message`, or accept with `None`.
    pub fn reject(&self, message: Option<&str>) {
        *self.reject_with.lock().unwrap() = message.map(str::to_string);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutIntentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentIntents for FakePayments {
    async fn create_intent(
        &self,
        request: &CheckoutIntentRequest,
    ) -> Result<CheckoutIntentResult, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.reject_with.lock().unwrap().clone() {
            return Err(UpstreamError::Status {
                status: 402,
                message,
            });
        }
        Ok(CheckoutIntentResult {
            id: CheckoutIntentId::new("pi_test_1"),
            status: CheckoutStatus::RequiresPaymentMethod,
            client_secret: Some("pi_test_1_secret".into()),
        })
    }
}

// =============================================================================
// Router harness
// =============================================================================

fn test_config() -> StorefrontConfig {
    StorefrontConfig::with_upstream(UpstreamConfig {
        cart_service_url: Url::parse("http://cart.invalid/api/").unwrap(),
        catalog_service_url: Url::parse("http://catalog.invalid/api/").unwrap(),
        payment_service_url: Url::parse("http://payments.invalid/api/").unwrap(),
        payment_api_key: SecretString::from("sk_test_integration".to_string()),
        timeout: Duration::from_secs(1),
    })
}

/// The storefront router over fake upstreams, with one shopper's cookie jar.
pub struct TestApp {
    router: Router,
    cookie: Option<String>,
    pub cart_service: Arc<FakeCartService>,
    pub catalog: Arc<FakeCatalog>,
    pub payments: Arc<FakePayments>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build the router with empty fakes.
    #[must_use]
    pub fn new() -> Self {
        let cart_service = Arc::new(FakeCartService::default());
        let catalog = Arc::new(FakeCatalog::default());
        let payments = Arc::new(FakePayments::default());

        let state = AppState::with_services(
            test_config(),
            cart_service.clone(),
            catalog.clone(),
            payments.clone(),
        );

        Self {
            router: cartwheel_storefront::app(state),
            cookie: None,
            cart_service,
            catalog,
            payments,
        }
    }

    /// Drop the session cookie, as a new device would.
    pub fn new_device(&mut self) {
        self.cookie = None;
    }

    /// Send a request, keeping the session cookie between calls.
    pub async fn send(
        &mut self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, body, cookie) = self.dispatch(method, path, token, body).await;
        if cookie.is_some() {
            self.cookie = cookie;
        }
        (status, body)
    }

    /// Send a request with the current cookie, leaving the cookie as it is.
    ///
    /// Borrows `self` shared, so requests can run concurrently.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, body, _) = self.dispatch(method, path, token, body).await;
        (status, body)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value, Option<String>) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();

        let cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(SESSION_COOKIE_NAME))
            .and_then(|value| value.split(';').next())
            .map(String::from);

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        (status, body, cookie)
    }

    /// `GET` a path.
    pub async fn get(&mut self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, path, token, None).await
    }

    /// `POST` a JSON body to a path.
    pub async fn post(
        &mut self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(Method::POST, path, token, Some(body)).await
    }

    /// Add `quantity` of `product_id` to the cart.
    pub async fn add(&mut self, product_id: &str, quantity: u32, token: Option<&str>) -> Value {
        let (status, body) = self
            .post(
                "/cart/add",
                token,
                json!({"product_id": product_id, "quantity": quantity}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "add failed: {body}");
        body
    }
}

/// `(product_id, quantity)` pairs of a cart view, in order.
#[must_use]
pub fn view_lines(view: &Value) -> Vec<(String, u64)> {
    view["lines"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .map(|line| {
                    (
                        line["product_id"].as_str().unwrap_or_default().to_string(),
                        line["quantity"].as_u64().unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `(product_id, quantity)` pairs of a stored cart, in order.
#[must_use]
pub fn cart_lines(cart: &Cart) -> Vec<(String, u64)> {
    cart.lines()
        .iter()
        .map(|line| (line.product_id.as_str().to_string(), u64::from(line.quantity.get())))
        .collect()
}

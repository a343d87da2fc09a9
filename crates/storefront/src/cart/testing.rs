//! In-memory upstream fakes shared by the cart tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use cartwheel_core::{
    Cart, CartLine, CheckoutIntentId, CheckoutIntentRequest, CheckoutIntentResult,
    CheckoutStatus, EnrichedCart, LineKey, Product, ProductId,
};

use crate::models::SessionToken;
use crate::upstream::{
    PaymentIntents, PayloadNormalizer, ProductCatalog, RemoteCart, UpstreamError,
};

pub fn qty(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

pub fn line(id: &str, quantity: u32) -> CartLine {
    CartLine::new(id, qty(quantity), None)
}

pub fn token() -> SessionToken {
    SessionToken::new("tok_test")
}

/// Catalog JSON for a well-formed product.
pub fn product_json(id: &str, price: &str) -> Value {
    json!({"_id": id, "name": id.to_uppercase(), "price": price, "countInStock": 10})
}

fn failure(status: u16) -> UpstreamError {
    if status == 401 {
        UpstreamError::Unauthorized
    } else {
        UpstreamError::Status {
            status,
            message: "unavailable".into(),
        }
    }
}

/// Remote cart that merges with the shared quantity policy.
#[derive(Default)]
pub struct FakeRemote {
    cart: Mutex<Cart>,
    merge_calls: Mutex<usize>,
    fail_with: Mutex<Option<u16>>,
    merge_delay: Mutex<Option<Duration>>,
    unreadable_merges: Mutex<bool>,
}

impl FakeRemote {
    pub fn with(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let remote = Self::default();
        *remote.cart.lock().unwrap() = Cart::from_lines(lines);
        remote
    }

    pub fn snapshot(&self) -> Cart {
        self.cart.lock().unwrap().clone()
    }

    pub fn merges(&self) -> usize {
        *self.merge_calls.lock().unwrap()
    }

    /// Make every call fail with `status` (401 rejects the token).
    pub fn fail(&self, status: Option<u16>) {
        *self.fail_with.lock().unwrap() = status;
    }

    /// Hold every merge for `delay` before applying it.
    pub fn delay_merges(&self, delay: Duration) {
        *self.merge_delay.lock().unwrap() = Some(delay);
    }

    /// Apply merges but answer as if the resulting cart could not be read.
    pub fn unreadable_merges(&self) {
        *self.unreadable_merges.lock().unwrap() = true;
    }

    fn check(&self) -> Result<(), UpstreamError> {
        self.fail_with.lock().unwrap().map_or(Ok(()), |s| Err(failure(s)))
    }

    fn current(&self) -> EnrichedCart {
        EnrichedCart::unresolved(self.snapshot())
    }
}

#[async_trait]
impl RemoteCart for FakeRemote {
    async fn fetch(&self, _: &SessionToken) -> Result<EnrichedCart, UpstreamError> {
        self.check()?;
        Ok(self.current())
    }

    async fn merge_lines(
        &self,
        _: &SessionToken,
        lines: &[CartLine],
    ) -> Result<EnrichedCart, UpstreamError> {
        *self.merge_calls.lock().unwrap() += 1;
        let delay = *self.merge_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        self.cart
            .lock()
            .unwrap()
            .merge(Cart::from_lines(lines.iter().cloned()));
        if *self.unreadable_merges.lock().unwrap() {
            return Err(UpstreamError::Unreadable(Box::new(failure(502))));
        }
        Ok(self.current())
    }

    async fn set_quantity(
        &self,
        _: &SessionToken,
        key: &LineKey,
        quantity: u32,
    ) -> Result<EnrichedCart, UpstreamError> {
        self.check()?;
        self.cart.lock().unwrap().set_quantity(key, quantity);
        Ok(self.current())
    }

    async fn remove_line(
        &self,
        _: &SessionToken,
        key: &LineKey,
    ) -> Result<EnrichedCart, UpstreamError> {
        self.check()?;
        self.cart.lock().unwrap().remove_line(key);
        Ok(self.current())
    }

    async fn clear(&self, _: &SessionToken) -> Result<(), UpstreamError> {
        self.check()?;
        *self.cart.lock().unwrap() = Cart::new();
        Ok(())
    }
}

/// Catalog serving raw JSON through the real normalizer.
pub struct FakeCatalog {
    records: HashMap<String, Value>,
    normalizer: PayloadNormalizer,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new<'a>(records: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|(id, raw)| (id.to_string(), raw))
                .collect(),
            normalizer: PayloadNormalizer::new("/img/placeholder.png"),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn fetch_product(&self, id: &ProductId) -> Result<Product, UpstreamError> {
        self.calls.lock().unwrap().push(id.as_str().to_string());
        let raw = self.records.get(id.as_str()).ok_or_else(|| UpstreamError::Status {
            status: 404,
            message: "not found".into(),
        })?;
        Ok(self.normalizer.normalize_product(raw)?)
    }
}

/// Payment service that records requests.
#[derive(Default)]
pub struct FakePayments {
    requests: Mutex<Vec<CheckoutIntentRequest>>,
    reject_with: Mutex<Option<String>>,
}

impl FakePayments {
    pub fn rejecting(message: &str) -> Self {
        let payments = Self::default();
        *payments.reject_with.lock().unwrap() = Some(message.to_string());
        payments
    }

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
            id: CheckoutIntentId::new("ci_test"),
            status: CheckoutStatus::RequiresPaymentMethod,
            client_secret: Some("secret_test".into()),
        })
    }
}

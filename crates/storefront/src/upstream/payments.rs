//! Payment-intent service client.
//!
//! Creates a checkout intent from a [`CheckoutIntentRequest`]. The service
//! authenticates this server with an API key, not the shopper's token.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use url::Url;

use cartwheel_core::{CheckoutIntentRequest, CheckoutIntentResult};

use super::conversions::unwrap_envelope;
use super::{UpstreamError, endpoint, http_client, read_json};
use crate::config::UpstreamConfig;

/// Domain-named envelope for intent responses.
const INTENT_ENVELOPE: &str = "intent";

/// External service that turns a checkout request into a payment intent.
#[async_trait]
pub trait PaymentIntents: Send + Sync {
    /// Create a payment intent for the request.
    async fn create_intent(
        &self,
        request: &CheckoutIntentRequest,
    ) -> Result<CheckoutIntentResult, UpstreamError>;
}

/// HTTP client for the payment-intent service.
#[derive(Clone)]
pub struct PaymentServiceClient {
    inner: Arc<PaymentServiceClientInner>,
}

struct PaymentServiceClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl PaymentServiceClient {
    /// Create a new payment service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            inner: Arc::new(PaymentServiceClientInner {
                client: http_client(upstream.timeout)?,
                base_url: upstream.payment_service_url.clone(),
                api_key: upstream.payment_api_key.clone(),
            }),
        })
    }
}

#[async_trait]
impl PaymentIntents for PaymentServiceClient {
    #[instrument(skip_all, fields(lines = request.lines.len(), units = request.total_quantity()))]
    async fn create_intent(
        &self,
        request: &CheckoutIntentRequest,
    ) -> Result<CheckoutIntentResult, UpstreamError> {
        let url = endpoint(&self.inner.base_url, &["checkout-intents"]);
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let raw = read_json(response).await?;
        let result = parse_intent(&raw)?;
        info!(intent_id = %result.id, status = ?result.status, "Checkout intent created");
        Ok(result)
    }
}

/// Parse an intent result from any supported envelope.
fn parse_intent(raw: &Value) -> Result<CheckoutIntentResult, UpstreamError> {
    let payload = unwrap_envelope(raw, INTENT_ENVELOPE);
    Ok(CheckoutIntentResult::deserialize(payload)?)
}

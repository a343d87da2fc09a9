//! Remote (authoritative) cart client.
//!
//! Every call carries the shopper's bearer token. A missing or rejected token
//! comes back as [`UpstreamError::Unauthorized`] so the pipeline can fall back
//! to the guest cart.
//!
//! Endpoints, relative to `CART_SERVICE_URL`:
//!
//! ```text
//! GET    cart         - current cart
//! POST   cart/items   - append-or-increment a batch of lines
//! PATCH  cart/items   - set the quantity of one line (0 removes it)
//! DELETE cart/items   - remove one line
//! DELETE cart         - empty the cart
//! ```
//!
//! A change the service accepts is applied even when its response carries no
//! readable cart (an empty `204`, an unexpected shape). In that case the cart
//! is read back with `GET cart`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};
use url::Url;

use cartwheel_core::{CartLine, EnrichedCart, LineKey, ProductId};

use super::{PayloadNormalizer, UpstreamError, endpoint, http_client, read_json};
use crate::config::UpstreamConfig;
use crate::models::SessionToken;

/// The server-side cart owned by an authenticated shopper.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// Fetch the current cart.
    async fn fetch(&self, token: &SessionToken) -> Result<EnrichedCart, UpstreamError>;

    /// Append-or-increment `lines` and return the resulting cart.
    ///
    /// An error for which [`UpstreamError::change_committed`] holds means the
    /// lines were added even though no cart came back.
    ///
    /// Lines sharing a `(product_id, variant)` with an existing line add their
    /// quantities; others are appended.
    async fn merge_lines(
        &self,
        token: &SessionToken,
        lines: &[CartLine],
    ) -> Result<EnrichedCart, UpstreamError>;

    /// Set the quantity of one line; zero removes it.
    async fn set_quantity(
        &self,
        token: &SessionToken,
        key: &LineKey,
        quantity: u32,
    ) -> Result<EnrichedCart, UpstreamError>;

    /// Remove one line.
    async fn remove_line(
        &self,
        token: &SessionToken,
        key: &LineKey,
    ) -> Result<EnrichedCart, UpstreamError>;

    /// Empty the cart.
    async fn clear(&self, token: &SessionToken) -> Result<(), UpstreamError>;
}

/// Line as the cart service expects it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinePayload<'a> {
    product_id: &'a ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
}

impl<'a> LinePayload<'a> {
    fn from_line(line: &'a CartLine) -> Self {
        Self {
            product_id: &line.product_id,
            quantity: Some(line.quantity.get()),
            variant: line.variant.as_deref(),
        }
    }

    fn from_key(key: &'a LineKey, quantity: Option<u32>) -> Self {
        Self {
            product_id: &key.product_id,
            quantity,
            variant: key.variant.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MergeBody<'a> {
    items: Vec<LinePayload<'a>>,
}

/// HTTP client for the cart service.
#[derive(Clone)]
pub struct CartServiceClient {
    inner: Arc<CartServiceClientInner>,
}

struct CartServiceClientInner {
    client: reqwest::Client,
    base_url: Url,
    normalizer: PayloadNormalizer,
}

impl CartServiceClient {
    /// Create a new cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        upstream: &UpstreamConfig,
        normalizer: PayloadNormalizer,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            inner: Arc::new(CartServiceClientInner {
                client: http_client(upstream.timeout)?,
                base_url: upstream.cart_service_url.clone(),
                normalizer,
            }),
        })
    }

    /// Send a request and normalize the cart in the response.
    async fn execute<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        token: &SessionToken,
        body: Option<&B>,
    ) -> Result<EnrichedCart, UpstreamError> {
        let raw = self.send(method, segments, token, body).await?;
        Ok(self.inner.normalizer.normalize_enriched_cart(&raw)?)
    }

    /// Send a cart-changing request and return the resulting cart.
    ///
    /// Once the service has answered 2xx the change stands, so an empty or
    /// unreadable body falls back to reading the cart. A failed read-back is
    /// wrapped in [`UpstreamError::Unreadable`].
    async fn mutate<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        token: &SessionToken,
        body: &B,
    ) -> Result<EnrichedCart, UpstreamError> {
        let raw = match self.send(method, segments, token, Some(body)).await {
            Ok(raw) => raw,
            Err(UpstreamError::Parse(err)) => {
                warn!(error = %err, "Cart change accepted with an unparseable body");
                Value::Null
            }
            Err(err) => return Err(err),
        };

        if !raw.is_null() {
            match self.inner.normalizer.normalize_enriched_cart(&raw) {
                Ok(cart) => return Ok(cart),
                Err(err) => {
                    warn!(error = %err, "Cart change accepted but response is not a cart");
                }
            }
        }

        self.fetch(token)
            .await
            .map_err(|err| UpstreamError::Unreadable(Box::new(err)))
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        token: &SessionToken,
        body: Option<&B>,
    ) -> Result<Value, UpstreamError> {
        if token.expose().trim().is_empty() {
            return Err(UpstreamError::Unauthorized);
        }

        let url = endpoint(&self.inner.base_url, segments);
        let mut request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        read_json(request.send().await?).await
    }
}

#[async_trait]
impl RemoteCart for CartServiceClient {
    #[instrument(skip_all)]
    async fn fetch(&self, token: &SessionToken) -> Result<EnrichedCart, UpstreamError> {
        self.execute::<()>(Method::GET, &["cart"], token, None).await
    }

    #[instrument(skip_all, fields(lines = lines.len()))]
    async fn merge_lines(
        &self,
        token: &SessionToken,
        lines: &[CartLine],
    ) -> Result<EnrichedCart, UpstreamError> {
        let body = MergeBody {
            items: lines.iter().map(LinePayload::from_line).collect(),
        };
        self.mutate(Method::POST, &["cart", "items"], token, &body)
            .await
    }

    #[instrument(skip_all, fields(product_id = %key.product_id, quantity = quantity))]
    async fn set_quantity(
        &self,
        token: &SessionToken,
        key: &LineKey,
        quantity: u32,
    ) -> Result<EnrichedCart, UpstreamError> {
        let body = LinePayload::from_key(key, Some(quantity));
        self.mutate(Method::PATCH, &["cart", "items"], token, &body)
            .await
    }

    #[instrument(skip_all, fields(product_id = %key.product_id))]
    async fn remove_line(
        &self,
        token: &SessionToken,
        key: &LineKey,
    ) -> Result<EnrichedCart, UpstreamError> {
        let body = LinePayload::from_key(key, None);
        self.mutate(Method::DELETE, &["cart", "items"], token, &body)
            .await
    }

    #[instrument(skip_all)]
    async fn clear(&self, token: &SessionToken) -> Result<(), UpstreamError> {
        self.send::<()>(Method::DELETE, &["cart"], token, None)
            .await
            .map(|_| ())
    }
}

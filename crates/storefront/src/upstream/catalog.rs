//! Product catalog client.
//!
//! Products are cached by id (TTL and capacity from [`CacheConfig`]). Only
//! successfully normalized products are cached, so a malformed record is
//! fetched again on the next view.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, instrument};
use url::Url;

use cartwheel_core::{Product, ProductId};

use super::{PayloadNormalizer, UpstreamError, endpoint, http_client, read_json};
use crate::config::{CacheConfig, UpstreamConfig};

/// Source of product records.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch and normalize a single product.
    async fn fetch_product(&self, id: &ProductId) -> Result<Product, UpstreamError>;
}

/// HTTP client for the catalog service.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: Url,
    normalizer: PayloadNormalizer,
    cache: Cache<ProductId, Product>,
}

impl CatalogClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        upstream: &UpstreamConfig,
        cache: &CacheConfig,
        normalizer: PayloadNormalizer,
    ) -> Result<Self, UpstreamError> {
        let cache = Cache::builder()
            .max_capacity(cache.capacity)
            .time_to_live(cache.ttl)
            .build();

        Ok(Self {
            inner: Arc::new(CatalogClientInner {
                client: http_client(upstream.timeout)?,
                base_url: upstream.catalog_service_url.clone(),
                normalizer,
                cache,
            }),
        })
    }
}

#[async_trait]
impl ProductCatalog for CatalogClient {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn fetch_product(&self, id: &ProductId) -> Result<Product, UpstreamError> {
        if let Some(product) = self.inner.cache.get(id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let url = endpoint(&self.inner.base_url, &["products", id.as_str()]);
        let response = self.inner.client.get(url).send().await?;
        let raw = read_json(response).await?;
        let product = self.inner.normalizer.normalize_product(&raw)?;

        self.inner.cache.insert(id.clone(), product.clone()).await;

        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::upstream::NormalizeError;
    use crate::upstream::stub::Stub;

    async fn catalog() -> (Stub, CatalogClient) {
        let stub = Stub::start(
            Router::new()
                .route(
                    "/api/products/p1",
                    get(|| async {
                        Json(json!({"product": {"_id": "p1", "name": "Tee", "price": "19.99", "images": [""]}}))
                    }),
                )
                .route(
                    "/api/products/broken",
                    get(|| async { Json(json!({"data": {"name": "No id", "price": 5}})) }),
                )
                .route(
                    "/api/products/flaky",
                    get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>") }),
                ),
        )
        .await;
        let client = CatalogClient::new(
            &stub.config(),
            &CacheConfig::default(),
            PayloadNormalizer::new("/img/placeholder.png"),
        )
        .unwrap();
        (stub, client)
    }

    #[tokio::test]
    async fn test_product_is_cached_after_first_fetch() {
        let (stub, client) = catalog().await;
        let id = ProductId::new("p1");

        let first = client.fetch_product(&id).await.unwrap();
        let second = client.fetch_product(&id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "Tee");
        assert_eq!(first.images, vec!["/img/placeholder.png".to_string()]);
        assert_eq!(stub.count(&Method::GET, "/api/products/p1"), 1);
        assert!(stub.seen()[0].authorization.is_none());
    }

    #[tokio::test]
    async fn test_malformed_product_is_not_cached() {
        let (stub, client) = catalog().await;
        let id = ProductId::new("broken");

        for _ in 0..2 {
            let result = client.fetch_product(&id).await;
            assert!(matches!(
                result,
                Err(UpstreamError::Normalize(NormalizeError::MalformedPayload(_)))
            ));
        }
        assert_eq!(stub.count(&Method::GET, "/api/products/broken"), 2);
    }

    #[tokio::test]
    async fn test_error_status_carries_truncated_body() {
        let (_stub, client) = catalog().await;

        let result = client.fetch_product(&ProductId::new("flaky")).await;
        match result {
            Err(UpstreamError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "<html>oops</html>");
            }
            other => panic!("expected status error, got {other:?}"),
        }

        let missing = client.fetch_product(&ProductId::new("nope")).await;
        assert!(matches!(missing, Err(UpstreamError::Status { status: 404, .. })));
    }
}

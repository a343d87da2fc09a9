//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartPipeline;
use crate::config::StorefrontConfig;
use crate::upstream::{
    CartServiceClient, CatalogClient, PaymentIntents, PaymentServiceClient, PayloadNormalizer,
    ProductCatalog, RemoteCart, UpstreamError,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the cart pipeline.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pipeline: CartPipeline,
}

impl AppState {
    /// Create application state backed by the HTTP upstream clients.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, UpstreamError> {
        let normalizer = PayloadNormalizer::new(config.placeholder_image_url.clone());
        let remote = CartServiceClient::new(&config.upstream, normalizer.clone())?;
        let catalog = CatalogClient::new(&config.upstream, &config.product_cache, normalizer)?;
        let payments = PaymentServiceClient::new(&config.upstream)?;

        Ok(Self::with_services(
            config,
            Arc::new(remote),
            Arc::new(catalog),
            Arc::new(payments),
        ))
    }

    /// Create application state over arbitrary upstream implementations.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        remote: Arc<dyn RemoteCart>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentIntents>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline: CartPipeline::new(remote, catalog, payments),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &CartPipeline {
        &self.inner.pipeline
    }
}

//! Request-level cart orchestration.
//!
//! Every operation first decides where the cart lives for this request:
//!
//! - no session token: the guest cart in device storage
//! - a token: reconcile once, then the remote cart; a rejected token falls
//!   back to the guest cart
//!
//! A failed reconcile also falls back to the guest cart and is reported on
//! the view as pending, so the next view retries it.

use std::slice;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use cartwheel_core::{
    Cart, CartLine, CheckoutIntentResult, EnrichedCart, EnrichedCartLine, LineKey, Price, Product,
    ProductId,
};

use super::checkout::CheckoutIntentBuilder;
use super::enrich::CartEnricher;
use super::error::CartError;
use super::local::{DeviceCartStore, DeviceStorage, LocalCartStore};
use super::reconcile::{CartReconciler, Reconciled};
use crate::models::SessionToken;
use crate::upstream::{PaymentIntents, ProductCatalog, RemoteCart, UpstreamError};

// =============================================================================
// Views
// =============================================================================

/// One cart line as presented to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartViewLine {
    /// Product identity.
    pub product_id: ProductId,
    /// Variant, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Desired quantity.
    pub quantity: u32,
    /// The product, or `None` if it could not be resolved.
    pub product: Option<Product>,
    /// Price per unit after discount.
    pub unit_price: Option<Price>,
    /// Unit price times quantity.
    pub line_total: Option<Price>,
}

impl From<&EnrichedCartLine> for CartViewLine {
    fn from(line: &EnrichedCartLine) -> Self {
        Self {
            product_id: line.line.product_id.clone(),
            variant: line.line.variant.clone(),
            quantity: line.line.quantity.get(),
            unit_price: line.product.as_ref().map(Product::unit_price),
            line_total: line.line_total(),
            product: line.product.clone(),
        }
    }
}

/// Cart as presented to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    /// Lines in cart order.
    pub lines: Vec<CartViewLine>,
    /// Sum of all quantities.
    pub total_quantity: u32,
    /// Sum of line totals over resolved lines.
    pub subtotal: Price,
    /// Lines whose product could not be loaded.
    pub unresolved: usize,
    /// Whether the remote cart is the source of this view.
    pub authenticated: bool,
    /// Whether a guest cart merge failed and will be retried.
    pub reconcile_pending: bool,
}

impl CartView {
    fn new(cart: &EnrichedCart, authenticated: bool, reconcile_pending: bool) -> Self {
        Self {
            lines: cart.lines.iter().map(CartViewLine::from).collect(),
            total_quantity: cart.total_quantity(),
            subtotal: cart.subtotal(),
            unresolved: cart.unresolved_count(),
            authenticated,
            reconcile_pending,
        }
    }
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    /// The payment intent created upstream.
    pub intent: CheckoutIntentResult,
    /// Lines left out because their product could not be loaded.
    pub omitted_lines: usize,
}

// =============================================================================
// Pipeline
// =============================================================================

/// A change to a cart, applied to whichever cart is authoritative.
#[derive(Debug, Clone)]
enum Mutation {
    Add(CartLine),
    SetQuantity(LineKey, u32),
    Remove(LineKey),
}

impl Mutation {
    fn apply(&self, cart: &mut Cart) {
        match self {
            Self::Add(line) => cart.add_line(line.clone()),
            Self::SetQuantity(key, quantity) => {
                cart.set_quantity(key, *quantity);
            }
            Self::Remove(key) => {
                cart.remove_line(key);
            }
        }
    }
}

/// Where the cart lives for one request.
enum Source<'t> {
    Guest {
        reconcile_error: Option<UpstreamError>,
    },
    Remote {
        token: &'t SessionToken,
        merged: Option<EnrichedCart>,
    },
}

/// A cart loaded from its source, before enrichment.
struct Loaded<'t> {
    cart: EnrichedCart,
    token: Option<&'t SessionToken>,
    reconcile_error: Option<UpstreamError>,
}

/// Cart operations over the guest and remote carts.
#[derive(Clone)]
pub struct CartPipeline {
    remote: Arc<dyn RemoteCart>,
    reconciler: CartReconciler,
    enricher: CartEnricher,
    checkout: CheckoutIntentBuilder,
}

impl CartPipeline {
    /// Create a pipeline over the three upstream services.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCart>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentIntents>,
    ) -> Self {
        Self {
            reconciler: CartReconciler::new(remote.clone()),
            remote,
            enricher: CartEnricher::new(catalog),
            checkout: CheckoutIntentBuilder::new(payments),
        }
    }

    /// The current cart, enriched with product data.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cart cannot be read or device storage
    /// cannot be written.
    #[instrument(skip_all, fields(authenticated = token.is_some()))]
    pub async fn view(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
    ) -> Result<CartView, CartError> {
        let loaded = self.load(storage, token).await?;
        Ok(self.present(loaded).await)
    }

    /// Total quantity across all lines, without product lookups.
    ///
    /// # Errors
    ///
    /// See [`CartPipeline::view`].
    pub async fn count(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
    ) -> Result<u32, CartError> {
        Ok(self.load(storage, token).await?.cart.total_quantity())
    }

    /// Add a line (append-or-increment).
    ///
    /// # Errors
    ///
    /// See [`CartPipeline::view`].
    #[instrument(skip_all, fields(product_id = %line.product_id, quantity = line.quantity.get()))]
    pub async fn add(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
        line: CartLine,
    ) -> Result<CartView, CartError> {
        self.mutate(storage, token, Mutation::Add(line)).await
    }

    /// Set the quantity of a line; zero removes it.
    ///
    /// # Errors
    ///
    /// See [`CartPipeline::view`].
    #[instrument(skip_all, fields(product_id = %key.product_id, quantity = quantity))]
    pub async fn update(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
        key: LineKey,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        self.mutate(storage, token, Mutation::SetQuantity(key, quantity))
            .await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// See [`CartPipeline::view`].
    #[instrument(skip_all, fields(product_id = %key.product_id))]
    pub async fn remove(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
        key: LineKey,
    ) -> Result<CartView, CartError> {
        self.mutate(storage, token, Mutation::Remove(key)).await
    }

    /// Check out the resolved lines of the current cart.
    ///
    /// On success the authoritative cart is cleared. On failure nothing is
    /// changed.
    ///
    /// # Errors
    ///
    /// - [`CartError::EmptyCheckout`] if no line could be resolved
    /// - [`CartError::CheckoutFailed`] if the payment service rejects it
    /// - [`CartError::ReconciliationFailed`] if the guest cart still has to be
    ///   merged into the remote cart
    #[instrument(skip_all, fields(authenticated = token.is_some()))]
    pub async fn checkout(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
    ) -> Result<CheckoutOutcome, CartError> {
        let loaded = self.load(storage, token).await?;
        if let Some(err) = loaded.reconcile_error {
            return Err(CartError::ReconciliationFailed(err));
        }

        let cart = self.enricher.enrich(loaded.cart).await;
        let request = CheckoutIntentBuilder::build_request(&cart)?;
        let intent = self.checkout.submit(&request).await?;

        match loaded.token {
            Some(token) => {
                if let Err(err) = self.remote.clear(token).await {
                    error!(error = %err, intent_id = %intent.id, "Checkout succeeded but remote cart was not cleared");
                }
            }
            None => {
                if let Err(err) = DeviceCartStore::new(storage).clear().await {
                    error!(error = %err, intent_id = %intent.id, "Checkout succeeded but guest cart was not cleared");
                }
            }
        }

        info!(intent_id = %intent.id, units = request.total_quantity(), "Checkout intent submitted");
        Ok(CheckoutOutcome {
            intent,
            omitted_lines: cart.unresolved_count(),
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn source<'t>(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&'t SessionToken>,
    ) -> Result<Source<'t>, CartError> {
        let Some(token) = token else {
            self.reconciler.reset(storage).await?;
            return Ok(Source::Guest {
                reconcile_error: None,
            });
        };

        match self.reconciler.ensure(storage, token).await {
            Ok(Reconciled::Merged(cart)) => Ok(Source::Remote {
                token,
                merged: Some(cart),
            }),
            Ok(
                Reconciled::Already | Reconciled::NothingToMerge | Reconciled::MergedUnread,
            ) => Ok(Source::Remote {
                token,
                merged: None,
            }),
            Err(CartError::Unauthenticated) => {
                info!("Session token rejected, using guest cart");
                Ok(Source::Guest {
                    reconcile_error: None,
                })
            }
            Err(CartError::ReconciliationFailed(err)) => Ok(Source::Guest {
                reconcile_error: Some(err),
            }),
            Err(other) => Err(other),
        }
    }

    async fn load<'t>(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&'t SessionToken>,
    ) -> Result<Loaded<'t>, CartError> {
        let reconcile_error = match self.source(storage, token).await? {
            Source::Remote { token, merged } => {
                let fetched = match merged {
                    Some(cart) => Ok(cart),
                    None => self.remote.fetch(token).await,
                };
                match fetched {
                    Ok(cart) => {
                        return Ok(Loaded {
                            cart,
                            token: Some(token),
                            reconcile_error: None,
                        });
                    }
                    Err(UpstreamError::Unauthorized) => {
                        self.fall_back_to_guest(storage).await?;
                        None
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Source::Guest { reconcile_error } => reconcile_error,
        };

        Ok(Loaded {
            cart: EnrichedCart::unresolved(DeviceCartStore::new(storage).read().await),
            token: None,
            reconcile_error,
        })
    }

    async fn mutate(
        &self,
        storage: &dyn DeviceStorage,
        token: Option<&SessionToken>,
        mutation: Mutation,
    ) -> Result<CartView, CartError> {
        let reconcile_error = match self.source(storage, token).await? {
            Source::Remote { token, .. } => match self.apply_remote(token, &mutation).await {
                Ok(cart) => {
                    return Ok(self
                        .present(Loaded {
                            cart,
                            token: Some(token),
                            reconcile_error: None,
                        })
                        .await);
                }
                Err(UpstreamError::Unauthorized) => {
                    self.fall_back_to_guest(storage).await?;
                    None
                }
                Err(err) => return Err(err.into()),
            },
            Source::Guest { reconcile_error } => reconcile_error,
        };

        let local = DeviceCartStore::new(storage);
        let mut cart = local.read().await;
        mutation.apply(&mut cart);
        local.write(&cart).await?;
        debug!(lines = cart.len(), "Guest cart updated");

        Ok(self
            .present(Loaded {
                cart: EnrichedCart::unresolved(cart),
                token: None,
                reconcile_error,
            })
            .await)
    }

    async fn apply_remote(
        &self,
        token: &SessionToken,
        mutation: &Mutation,
    ) -> Result<EnrichedCart, UpstreamError> {
        match mutation {
            Mutation::Add(line) => self.remote.merge_lines(token, slice::from_ref(line)).await,
            Mutation::SetQuantity(key, quantity) => {
                self.remote.set_quantity(token, key, *quantity).await
            }
            Mutation::Remove(key) => self.remote.remove_line(token, key).await,
        }
    }

    async fn fall_back_to_guest(&self, storage: &dyn DeviceStorage) -> Result<(), CartError> {
        warn!("Cart service rejected the session token, using guest cart");
        self.reconciler.reset(storage).await
    }

    async fn present(&self, loaded: Loaded<'_>) -> CartView {
        let cart = self.enricher.enrich(loaded.cart).await;
        CartView::new(
            &cart,
            loaded.token.is_some(),
            loaded.reconcile_error.is_some(),
        )
    }
}

//! Product lookup for unresolved cart lines.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{instrument, warn};

use cartwheel_core::EnrichedCart;

use crate::upstream::ProductCatalog;

/// Joins cart lines with catalog products.
#[derive(Clone)]
pub struct CartEnricher {
    catalog: Arc<dyn ProductCatalog>,
}

impl CartEnricher {
    /// Create an enricher backed by `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    /// Look up the product for every unresolved line.
    ///
    /// Lookups run concurrently and all finish before this returns. A failed
    /// lookup leaves its line unresolved; lines already carrying a product
    /// are not fetched again.
    #[instrument(skip_all, fields(lines = cart.lines.len(), unresolved = tracing::field::Empty))]
    pub async fn enrich(&self, mut cart: EnrichedCart) -> EnrichedCart {
        let pending: Vec<usize> = cart
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_resolved())
            .map(|(index, _)| index)
            .collect();

        let lookups = pending.iter().map(|&index| {
            let product_id = &cart.lines[index].line.product_id;
            self.catalog.fetch_product(product_id)
        });
        let results = join_all(lookups).await;

        for (index, result) in pending.into_iter().zip(results) {
            let line = &mut cart.lines[index];
            match result {
                Ok(product) => line.product = Some(product),
                Err(err) => {
                    warn!(product_id = %line.line.product_id, error = %err, "Product lookup failed, line unresolved");
                }
            }
        }

        tracing::Span::current().record("unresolved", cart.unresolved_count());
        cart
    }
}

//! Checkout intent construction and submission.

use std::sync::Arc;

use tracing::{instrument, warn};

use cartwheel_core::{CheckoutIntentRequest, CheckoutIntentResult, CheckoutLine, EnrichedCart};

use super::error::CartError;
use crate::upstream::PaymentIntents;

/// Projects a cart into a checkout intent and submits it.
///
/// The builder never mutates a cart; clearing after a successful checkout is
/// up to the caller.
#[derive(Clone)]
pub struct CheckoutIntentBuilder {
    payments: Arc<dyn PaymentIntents>,
}

impl CheckoutIntentBuilder {
    /// Create a builder that submits to `payments`.
    #[must_use]
    pub fn new(payments: Arc<dyn PaymentIntents>) -> Self {
        Self { payments }
    }

    /// Build a request from the resolved lines of `cart`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::EmptyCheckout`] if no line is resolved.
    pub fn build_request(cart: &EnrichedCart) -> Result<CheckoutIntentRequest, CartError> {
        let lines: Vec<CheckoutLine> = cart
            .resolved_lines()
            .map(|l| CheckoutLine {
                product_id: l.line.product_id.clone(),
                quantity: l.line.quantity,
            })
            .collect();

        if lines.is_empty() {
            return Err(CartError::EmptyCheckout);
        }

        Ok(CheckoutIntentRequest { lines })
    }

    /// Submit a request to the payment-intent service.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::CheckoutFailed`] with the upstream message on any
    /// transport failure or rejection.
    #[instrument(skip_all, fields(lines = request.lines.len()))]
    pub async fn submit(
        &self,
        request: &CheckoutIntentRequest,
    ) -> Result<CheckoutIntentResult, CartError> {
        self.payments.create_intent(request).await.map_err(|err| {
            warn!(error = %err, "Checkout intent rejected");
            CartError::CheckoutFailed(err.upstream_message())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::{DiscountPercent, EnrichedCartLine, Price, Product};

    use super::*;
    use crate::cart::testing::{FakePayments, line};

    fn resolved(id: &str, quantity: u32) -> EnrichedCartLine {
        EnrichedCartLine::resolved(
            line(id, quantity),
            Product {
                id: id.into(),
                name: id.into(),
                price: Price::ZERO,
                images: vec![],
                stock: 1,
                discount_percent: DiscountPercent::NONE,
            },
        )
    }

    fn unresolved(id: &str) -> EnrichedCartLine {
        EnrichedCartLine::unresolved(line(id, 1))
    }

    #[test]
    fn test_build_request_skips_unresolved_lines() {
        let cart = EnrichedCart::new(vec![resolved("p1", 2), unresolved("p2"), resolved("p3", 1)]);
        let request = CheckoutIntentBuilder::build_request(&cart).unwrap();
        let ids: Vec<&str> = request.lines.iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert_eq!(request.total_quantity(), 3);
    }

    #[test]
    fn test_build_request_with_no_resolved_lines_is_empty_checkout() {
        let cart = EnrichedCart::new(vec![unresolved("p2")]);
        assert!(matches!(
            CheckoutIntentBuilder::build_request(&cart),
            Err(CartError::EmptyCheckout)
        ));
        assert!(matches!(
            CheckoutIntentBuilder::build_request(&EnrichedCart::default()),
            Err(CartError::EmptyCheckout)
        ));
    }

    #[tokio::test]
    async fn test_submit_success() {
        let payments = Arc::new(FakePayments::default());
        let builder = CheckoutIntentBuilder::new(payments.clone());
        let request =
            CheckoutIntentBuilder::build_request(&EnrichedCart::new(vec![resolved("p1", 1)]))
                .unwrap();

        let result = builder.submit(&request).await.unwrap();
        assert_eq!(result.id.as_str(), "ci_test");
        assert_eq!(payments.requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_checkout_failed() {
        let builder = CheckoutIntentBuilder::new(Arc::new(FakePayments::rejecting("card declined")));
        let request =
            CheckoutIntentBuilder::build_request(&EnrichedCart::new(vec![resolved("p1", 1)]))
                .unwrap();

        match builder.submit(&request).await {
            Err(CartError::CheckoutFailed(message)) => assert_eq!(message, "card declined"),
            other => panic!("expected CheckoutFailed, got {other:?}"),
        }
    }
}

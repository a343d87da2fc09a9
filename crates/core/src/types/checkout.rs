//! Checkout intent request and result.
//!
//! The request is a projection of the resolved cart lines; the result is
//! whatever the external payment-intent service hands back.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::id::{CheckoutIntentId, ProductId};

/// One purchasable line in a checkout intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    /// Product identity.
    pub product_id: ProductId,
    /// Quantity to purchase.
    pub quantity: NonZeroU32,
}

/// Body sent to the payment-intent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutIntentRequest {
    /// Lines to purchase, never empty.
    pub lines: Vec<CheckoutLine>,
}

impl CheckoutIntentRequest {
    /// Total units requested.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |total, line| total.saturating_add(line.quantity.get()))
    }
}

/// Status reported by the payment-intent service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// Waiting for the shopper to supply a payment method.
    #[default]
    RequiresPaymentMethod,
    /// Waiting for the shopper to confirm.
    RequiresConfirmation,
    /// Additional shopper action (e.g., 3-D Secure) is needed.
    RequiresAction,
    /// Payment is being processed.
    Processing,
    /// Payment completed.
    Succeeded,
    /// Intent was canceled.
    Canceled,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Result returned by the payment-intent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutIntentResult {
    /// Opaque intent identifier.
    pub id: CheckoutIntentId,
    /// Current status of the intent.
    #[serde(default)]
    pub status: CheckoutStatus,
    /// Client secret for completing payment in the browser, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

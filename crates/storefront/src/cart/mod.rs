//! Guest cart, reconciliation and checkout.
//!
//! # Architecture
//!
//! - [`local`]: device-scoped guest cart and wishlist behind [`DeviceStorage`]
//! - [`reconcile`]: one-shot merge of the guest cart into the remote cart,
//!   driven by the [`SessionPhase`] state machine
//! - [`enrich`]: concurrent product lookup for cart lines
//! - [`checkout`]: projection of resolved lines into a checkout intent
//! - [`pipeline`]: the per-request entry point used by the routes

pub mod checkout;
pub mod enrich;
pub mod error;
pub mod local;
pub mod pipeline;
pub mod reconcile;

#[cfg(test)]
mod testing;

pub use checkout::CheckoutIntentBuilder;
pub use enrich::CartEnricher;
pub use error::CartError;
pub use local::{
    DeviceCartStore, DeviceStorage, LocalCartStore, MemoryStorage, SessionStorage, StorageError,
    WishlistStore,
};
pub use pipeline::{CartPipeline, CartView, CartViewLine, CheckoutOutcome};
pub use reconcile::{CartReconciler, Reconciled, SessionPhase};

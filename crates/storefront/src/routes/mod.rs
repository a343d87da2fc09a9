//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart (JSON)
//! GET  /cart                   - Cart view (reconciles, then enriches)
//! POST /cart/add               - Add a line
//! POST /cart/update            - Set a line's quantity (0 removes)
//! POST /cart/remove            - Remove a line
//! GET  /cart/count             - Total quantity
//!
//! # Checkout
//! POST /checkout               - Submit a checkout intent
//!
//! # Wishlist
//! GET  /wishlist               - Saved product ids
//! POST /wishlist/toggle        - Save or unsave a product
//! ```
//!
//! Every route reads the shopper's device storage from the session cookie
//! and the optional session token from `Authorization: Bearer`.

pub mod cart;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/toggle", post(wishlist::toggle))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/cart", cart_routes())
        .route("/checkout", post(cart::checkout))
        .nest("/wishlist", wishlist_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check upstreams.
async fn health() -> &'static str {
    "ok"
}

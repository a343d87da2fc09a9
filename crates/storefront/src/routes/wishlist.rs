//! Wishlist route handlers.
//!
//! The wishlist lives in device storage only; it is never sent upstream.

use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartwheel_core::{ProductId, Wishlist};

use crate::cart::{CartError, WishlistStore};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::Device;

/// Toggle request body.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub product_id: ProductId,
}

/// Toggle response.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    /// Whether the product is saved after the toggle.
    pub saved: bool,
    pub wishlist: Wishlist,
}

/// List saved product ids.
#[instrument(skip_all)]
pub async fn show(Device(storage): Device) -> Json<Wishlist> {
    Json(WishlistStore::new(&storage).read().await)
}

/// Save the product, or unsave it if already saved.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn toggle(
    Device(storage): Device,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>> {
    if body.product_id.as_str().trim().is_empty() {
        return Err(AppError::BadRequest("product_id must not be empty".to_string()));
    }

    add_breadcrumb(
        "wishlist",
        "Wishlist toggled",
        Some(&[("product_id", body.product_id.as_str())]),
    );

    let (wishlist, saved) = WishlistStore::new(&storage)
        .toggle(body.product_id)
        .await
        .map_err(CartError::from)?;

    Ok(Json(ToggleResponse { saved, wishlist }))
}

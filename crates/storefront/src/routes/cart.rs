//! Cart route handlers.
//!
//! Every handler runs through the cart pipeline, which picks the guest cart
//! or the remote cart depending on the bearer token and merges the guest cart
//! on the first authenticated request.

use std::num::NonZeroU32;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartwheel_core::{CartLine, LineKey, ProductId};

use crate::cart::{CartView, CheckoutOutcome};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{Device, OptionalToken};
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    pub variant: Option<String>,
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub quantity: u32,
}

/// Remove line request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
    pub variant: Option<String>,
}

/// Cart count response.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

fn non_empty_id(id: &ProductId) -> Result<()> {
    if id.as_str().trim().is_empty() {
        return Err(AppError::BadRequest("product_id must not be empty".to_string()));
    }
    Ok(())
}

/// Display the cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    Device(storage): Device,
    token: OptionalToken,
) -> Result<Json<CartView>> {
    let view = state.pipeline().view(&storage, token.token()).await?;
    Ok(Json(view))
}

/// Add a line, or increment it if already present.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    Device(storage): Device,
    token: OptionalToken,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    non_empty_id(&body.product_id)?;
    let quantity = NonZeroU32::new(body.quantity.unwrap_or(1))
        .ok_or_else(|| AppError::BadRequest("quantity must be at least 1".to_string()))?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", body.product_id.as_str())]),
    );

    let line = CartLine::new(body.product_id, quantity, body.variant);
    let view = state.pipeline().add(&storage, token.token(), line).await?;
    Ok(Json(view))
}

/// Set the quantity of a line. Zero removes it.
#[instrument(skip_all, fields(product_id = %body.product_id, quantity = body.quantity))]
pub async fn update(
    State(state): State<AppState>,
    Device(storage): Device,
    token: OptionalToken,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    non_empty_id(&body.product_id)?;
    let key = LineKey::new(body.product_id, body.variant);
    let view = state
        .pipeline()
        .update(&storage, token.token(), key, body.quantity)
        .await?;
    Ok(Json(view))
}

/// Remove a line.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    Device(storage): Device,
    token: OptionalToken,
    Json(body): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    non_empty_id(&body.product_id)?;
    add_breadcrumb(
        "cart",
        "Removed from cart",
        Some(&[("product_id", body.product_id.as_str())]),
    );

    let key = LineKey::new(body.product_id, body.variant);
    let view = state.pipeline().remove(&storage, token.token(), key).await?;
    Ok(Json(view))
}

/// Total quantity in the cart.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    Device(storage): Device,
    token: OptionalToken,
) -> Result<Json<CartCount>> {
    let count = state.pipeline().count(&storage, token.token()).await?;
    Ok(Json(CartCount { count }))
}

/// Build and submit a checkout intent for the current cart.
///
/// On success the cart that was checked out is cleared.
#[instrument(skip_all)]
pub async fn checkout(
    State(state): State<AppState>,
    Device(storage): Device,
    token: OptionalToken,
) -> Result<Json<CheckoutOutcome>> {
    add_breadcrumb("checkout", "Checkout started", None);
    let outcome = state.pipeline().checkout(&storage, token.token()).await?;
    Ok(Json(outcome))
}

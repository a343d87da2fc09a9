//! Session middleware configuration.
//!
//! Sets up memory-backed sessions using tower-sessions. The session is the
//! shopper's device storage: it holds the guest cart, the wishlist and the
//! reconcile phase.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::cart::SessionStorage;
use crate::config::StorefrontConfig;
use crate::error::AppError;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "cartwheel_session";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Extractor for the shopper's device storage.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Device(storage): Device) -> impl IntoResponse {
///     let cart = DeviceCartStore::new(&storage).read().await;
///     Json(cart)
/// }
/// ```
pub struct Device(pub SessionStorage);

impl<S> FromRequestParts<S> for Device
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))?;

        Ok(Self(SessionStorage::new(session)))
    }
}

//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::cart::CartError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart pipeline operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::Unauthenticated => StatusCode::UNAUTHORIZED,
                CartError::EmptyCheckout => StatusCode::UNPROCESSABLE_ENTITY,
                CartError::ReconciliationFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                CartError::CheckoutFailed(_)
                | CartError::MalformedPayload(_)
                | CartError::Upstream(_) => StatusCode::BAD_GATEWAY,
                CartError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error indicates a server-side fault worth reporting.
    const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Cart(
                    CartError::Storage(_) | CartError::Upstream(_) | CartError::MalformedPayload(_)
                )
        )
    }

    /// Message shown to the client. Internal details are never exposed.
    fn client_message(&self) -> String {
        match self {
            Self::Cart(err) => match err {
                CartError::Unauthenticated => "Please sign in again".to_string(),
                CartError::EmptyCheckout => {
                    "None of the items in your cart are available for checkout".to_string()
                }
                CartError::ReconciliationFailed(_) => {
                    "Your saved cart is still being synchronized, please try again".to_string()
                }
                CartError::CheckoutFailed(message) => message.clone(),
                CartError::MalformedPayload(_) | CartError::Upstream(_) => {
                    "External service error".to_string()
                }
                CartError::Storage(_) => "Internal server error".to_string(),
            },
            Self::BadRequest(_) => self.to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.client_message(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

//! Clients for the catalog, cart and payment-intent services.
//!
//! # Architecture
//!
//! - Plain JSON over `reqwest`; every response is run through the
//!   [`PayloadNormalizer`] before it reaches the cart pipeline
//! - Each service sits behind a trait ([`ProductCatalog`], [`RemoteCart`],
//!   [`PaymentIntents`]) so the pipeline can be driven by in-memory fakes
//! - Product lookups are cached via `moka` (TTL from configuration)

pub mod cart_service;
pub mod catalog;
pub mod conversions;
pub mod payments;
#[cfg(test)]
pub(crate) mod stub;

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub use cart_service::{CartServiceClient, RemoteCart};
pub use catalog::{CatalogClient, ProductCatalog};
pub use conversions::{NormalizeError, PayloadNormalizer};
pub use payments::{PaymentIntents, PaymentServiceClient};

/// Errors that can occur when talking to upstream services.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the error envelope, or a truncated body.
        message: String,
    },

    /// The session token was missing or rejected.
    #[error("session token rejected")]
    Unauthorized,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response could not be normalized.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// A change was accepted but the resulting state could not be read back.
    #[error("change accepted but not readable: {0}")]
    Unreadable(#[source] Box<UpstreamError>),
}

impl UpstreamError {
    /// Message suitable for reporting back to the shopper.
    #[must_use]
    pub fn upstream_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the service answered with a success status before failing.
    ///
    /// A parse or normalize failure can only follow a 2xx response, so the
    /// request itself was applied upstream.
    #[must_use]
    pub const fn change_committed(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Normalize(_) | Self::Unreadable(_))
    }
}

/// Build the shared HTTP client with the configured request timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Append path segments to a base URL, escaping each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Read a response body as JSON, mapping failure statuses to [`UpstreamError`].
///
/// An empty success body reads as `null`.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, UpstreamError> {
    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(UpstreamError::Unauthorized);
    }

    if !status.is_success() {
        let message = error_message(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.chars().take(200).collect()
            }
        });
        tracing::warn!(status = %status, message = %message, "Upstream returned non-success status");
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse upstream response"
        );
        UpstreamError::Parse(e)
    })
}

/// Pull a human-readable message out of an error envelope.
///
/// Accepts `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": ...}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    let nested = object.get("error").and_then(|error| match error {
        Value::String(message) => Some(message.as_str()),
        Value::Object(error) => error.get("message").and_then(Value::as_str),
        _ => None,
    });

    nested
        .or_else(|| object.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(String::from)
}

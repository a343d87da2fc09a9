//! Cart pipeline errors.

use thiserror::Error;

use super::local::StorageError;
use crate::upstream::{NormalizeError, UpstreamError};

/// Errors that can occur in the cart pipeline.
#[derive(Debug, Error)]
pub enum CartError {
    /// An upstream payload could not be normalized.
    #[error(transparent)]
    MalformedPayload(#[from] NormalizeError),

    /// No session token, or the cart service rejected it.
    #[error("not authenticated")]
    Unauthenticated,

    /// Merging the guest cart into the remote cart failed; retried on the next view.
    #[error("guest cart reconciliation failed: {0}")]
    ReconciliationFailed(#[source] UpstreamError),

    /// No resolved lines to check out.
    #[error("nothing to check out")]
    EmptyCheckout,

    /// The payment-intent service rejected the checkout or could not be reached.
    #[error("checkout failed: {0}")]
    CheckoutFailed(String),

    /// Any other upstream failure.
    #[error("upstream error: {0}")]
    Upstream(#[source] UpstreamError),

    /// Device storage could not be read or written.
    #[error("device storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<UpstreamError> for CartError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unauthorized => Self::Unauthenticated,
            UpstreamError::Normalize(err) => Self::MalformedPayload(err),
            other => Self::Upstream(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_unauthenticated() {
        assert!(matches!(
            CartError::from(UpstreamError::Unauthorized),
            CartError::Unauthenticated
        ));
    }

    #[test]
    fn test_normalize_error_maps_to_malformed() {
        let err = UpstreamError::Normalize(NormalizeError::MalformedPayload("no id".into()));
        assert!(matches!(
            CartError::from(err),
            CartError::MalformedPayload(NormalizeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_status_maps_to_upstream() {
        let err = UpstreamError::Status {
            status: 503,
            message: "down".into(),
        };
        assert!(matches!(CartError::from(err), CartError::Upstream(_)));
    }
}

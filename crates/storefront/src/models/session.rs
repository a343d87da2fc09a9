//! Session-related types.
//!
//! The guest cart, wishlist and reconcile phase live in the shopper's
//! session; the bearer token arrives per request and is never stored.

use secrecy::{ExposeSecret, SecretString};

/// Opaque bearer credential issued by the external auth provider.
///
/// Its presence alone selects the authenticated code path; the cart service
/// is the only party that validates it.
#[derive(Debug)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token, for the `Authorization` header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Session keys for device-scoped cart data.
pub mod keys {
    /// Key for the guest cart (JSON array of cart lines).
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the wishlist (JSON array of product ids).
    pub const WISHLIST: &str = "wishlist";

    /// Key for the reconcile state machine.
    pub const SESSION_PHASE: &str = "session_phase";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_debug_is_redacted() {
        let token = SessionToken::new("tok_live_abcdef");
        assert!(!format!("{token:?}").contains("tok_live_abcdef"));
        assert_eq!(token.expose(), "tok_live_abcdef");
    }
}

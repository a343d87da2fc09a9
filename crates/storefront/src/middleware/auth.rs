//! Session token extraction.
//!
//! The token is issued by an external auth provider and sent as
//! `Authorization: Bearer <token>`. This service never validates it; the cart
//! service does, and a rejection sends the request down the guest path.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::models::SessionToken;

/// Extractor that optionally reads the bearer session token.
///
/// Never rejects: a missing or malformed header yields `None`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalToken(token): OptionalToken) -> impl IntoResponse {
///     match token {
///         Some(_) => "signed in",
///         None => "guest",
///     }
/// }
/// ```
pub struct OptionalToken(pub Option<SessionToken>);

impl OptionalToken {
    /// Borrow the token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&SessionToken> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for OptionalToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
            .map(SessionToken::new);

        Ok(Self(token))
    }
}

/// Token from an `Authorization` value, if it uses the bearer scheme.
fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

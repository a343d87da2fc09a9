//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with memory store)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::OptionalToken;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use session::{Device, SESSION_COOKIE_NAME, create_session_layer};

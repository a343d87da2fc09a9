//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_SERVICE_URL` - Base URL of the account cart service
//! - `CATALOG_SERVICE_URL` - Base URL of the product catalog service
//! - `PAYMENT_SERVICE_URL` - Base URL of the payment-intent service
//! - `PAYMENT_SERVICE_API_KEY` - Server-side payment service credential (high entropy)
//!
//! ## Optional
//! - `CARTWHEEL_HOST` - Bind address (default: 127.0.0.1)
//! - `CARTWHEEL_PORT` - Listen port (default: 3000)
//! - `CARTWHEEL_BASE_URL` - Public URL (default: <http://localhost:3000>)
//! - `PLACEHOLDER_IMAGE_URL` - Image used when a product image is blank
//! - `PRODUCT_CACHE_TTL_SECS` - Product cache TTL (default: 300)
//! - `PRODUCT_CACHE_CAPACITY` - Product cache capacity (default: 1000)
//! - `UPSTREAM_TIMEOUT_SECS` - Timeout for upstream HTTP calls (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default image shown for products whose image entries are blank.
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "/static/images/placeholder.png";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Upstream service configuration
    pub upstream: UpstreamConfig,
    /// Image used in place of blank product images
    pub placeholder_image_url: String,
    /// Product lookup cache settings
    pub product_cache: CacheConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., production, staging)
    pub sentry_environment: Option<String>,
}

/// Upstream HTTP service configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Account cart service base URL
    pub cart_service_url: Url,
    /// Product catalog service base URL
    pub catalog_service_url: Url,
    /// Payment-intent service base URL
    pub payment_service_url: Url,
    /// Payment-intent service API key (server-side only)
    pub payment_api_key: SecretString,
    /// Timeout applied to every upstream request
    pub timeout: Duration,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("cart_service_url", &self.cart_service_url.as_str())
            .field("catalog_service_url", &self.catalog_service_url.as_str())
            .field("payment_service_url", &self.payment_service_url.as_str())
            .field("payment_api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// In-memory cache settings.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Time-to-live for cached entries
    pub ttl: Duration,
    /// Maximum number of cached entries
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1000,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("CARTWHEEL_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("CARTWHEEL_PORT", "3000")?;
        let base_url = get_env_or_default("CARTWHEEL_BASE_URL", "http://localhost:3000");
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("CARTWHEEL_BASE_URL".to_string(), e.to_string()))?;

        let upstream = UpstreamConfig::from_env()?;
        let placeholder_image_url =
            get_env_or_default("PLACEHOLDER_IMAGE_URL", DEFAULT_PLACEHOLDER_IMAGE);
        let product_cache = CacheConfig {
            ttl: Duration::from_secs(parse_env_or_default::<u64>("PRODUCT_CACHE_TTL_SECS", "300")?),
            capacity: parse_env_or_default::<u64>("PRODUCT_CACHE_CAPACITY", "1000")?,
        };

        Ok(Self {
            host,
            port,
            base_url,
            upstream,
            placeholder_image_url,
            product_cache,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration with default settings around the given upstreams.
    #[must_use]
    pub fn with_upstream(upstream: UpstreamConfig) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            upstream,
            placeholder_image_url: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
            product_cache: CacheConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl UpstreamConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cart_service_url: get_required_url("CART_SERVICE_URL")?,
            catalog_service_url: get_required_url("CATALOG_SERVICE_URL")?,
            payment_service_url: get_required_url("PAYMENT_SERVICE_URL")?,
            payment_api_key: get_validated_secret("PAYMENT_SERVICE_API_KEY")?,
            timeout: Duration::from_secs(parse_env_or_default::<u64>("UPSTREAM_TIMEOUT_SECS", "10")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as an absolute base URL.
///
/// A trailing slash is enforced so relative joins keep the base path.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    parse_base_url(key, &get_required_env(key)?)
}

fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let mut value = value.trim().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    let url = Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

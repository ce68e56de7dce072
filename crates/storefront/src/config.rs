//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `CHEC_PUBLIC_KEY` - Commerce API public key (cart, checkout, catalog reads)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CHEC_SECRET_KEY` - Commerce API secret key (catalog writes, needed for seeding)
//! - `CHEC_API_URL` - Commerce API base URL (default: <https://api.chec.io/v1>)
//! - `CATALOG_SEED_URL` - Mock product endpoint used to seed an empty catalog
//! - `CATALOG_SEED_ON_EMPTY` - Seed at startup when the catalog is empty (default: true)
//! - `CATALOG_LIST_LIMIT` - Products shown on the home page (default: 50)
//! - `CHECKOUT_PAYMENT_GATEWAY` - Gateway used on capture (default: `test_gateway`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default commerce API base URL.
pub const DEFAULT_API_URL: &str = "https://api.chec.io/v1";

/// Default mock endpoint listing the products to seed.
pub const DEFAULT_SEED_URL: &str = "https://5d6da1df777f670014036125.mockapi.io/api/v1/product";

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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
    /// Commerce API configuration
    pub commerce: CommerceConfig,
    /// Catalog seeding configuration
    pub catalog: CatalogConfig,
    /// Checkout configuration
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Commerce API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct CommerceConfig {
    /// API base URL without trailing slash (e.g. <https://api.chec.io/v1>)
    pub api_url: String,
    /// Public key (safe to expose in browser)
    pub public_key: String,
    /// Secret key (server-side only, required for catalog writes)
    pub secret_key: Option<SecretString>,
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("api_url", &self.api_url)
            .field("public_key", &self.public_key)
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Catalog seeding configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Mock endpoint returning the products to seed
    pub seed_url: String,
    /// Seed at startup when the remote catalog is empty
    pub seed_on_empty: bool,
    /// Maximum number of products listed
    pub list_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed_url: DEFAULT_SEED_URL.to_string(),
            seed_on_empty: true,
            list_limit: 50,
        }
    }
}

/// Checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Payment gateway name sent on capture
    pub payment_gateway: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            payment_gateway: "test_gateway".to_string(),
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
    /// if the secret key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        validate_url(&base_url, "STOREFRONT_BASE_URL")?;

        let commerce = CommerceConfig::from_env()?;
        let catalog = CatalogConfig::from_env()?;
        let checkout = CheckoutConfig {
            payment_gateway: get_env_or_default("CHECKOUT_PAYMENT_GATEWAY", "test_gateway"),
        };

        Ok(Self {
            host,
            port,
            base_url,
            commerce,
            catalog,
            checkout,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
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

impl CommerceConfig {
    /// Load the commerce API settings on their own.
    ///
    /// Used by the CLI, which does not need the HTTP server settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the public key is missing, the API URL is
    /// invalid, or the secret key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_env_or_default("CHEC_API_URL", DEFAULT_API_URL);
        validate_url(&api_url, "CHEC_API_URL")?;

        let secret_key = match get_optional_env("CHEC_SECRET_KEY") {
            Some(value) => {
                validate_secret_strength(&value, "CHEC_SECRET_KEY")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            public_key: get_required_env("CHEC_PUBLIC_KEY")?,
            secret_key,
        })
    }
}

impl CatalogConfig {
    /// Load the catalog seeding settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed_url = get_env_or_default("CATALOG_SEED_URL", DEFAULT_SEED_URL);
        validate_url(&seed_url, "CATALOG_SEED_URL")?;

        let seed_on_empty = parse_bool(&get_env_or_default("CATALOG_SEED_ON_EMPTY", "true"))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "CATALOG_SEED_ON_EMPTY".to_string(),
                    "expected true or false".to_string(),
                )
            })?;

        let list_limit = get_env_or_default("CATALOG_LIST_LIMIT", "50")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CATALOG_LIST_LIMIT".to_string(), e.to_string())
            })?;

        Ok(Self {
            seed_url,
            seed_on_empty,
            list_limit,
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

/// Get an optional environment variable, treating an empty value as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a sample rate between 0.0 and 1.0.
fn get_rate(key: &str, default: &str) -> Result<f32, ConfigError> {
    let rate = get_env_or_default(key, default)
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ))
    }
}

/// Parse a boolean flag.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that a value is an absolute http(s) URL.
fn validate_url(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the Chec dashboard."
            ),
        ));
    }

    Ok(())
}

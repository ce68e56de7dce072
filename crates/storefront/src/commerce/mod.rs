//! Chec commerce API client.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`, JSON bodies via `serde`
//! - The commerce service is source of truth - NO local sync, direct API calls
//! - In-memory caching via `moka` for catalog reads (5 minute TTL)
//!
//! # Keys
//!
//! - Public key: catalog reads, cart and checkout operations
//! - Secret key: catalog writes (products, assets), used when seeding
//!
//! # Example
//!
//! ```rust,ignore
//! use vitrine_storefront::commerce::CommerceClient;
//!
//! let client = CommerceClient::new(&config.commerce);
//!
//! let cart = client.create_cart().await?;
//! let cart = client.add_to_cart(&cart.id, &product.id, 1).await?;
//! assert_eq!(cart.total_items, 1);
//! ```

mod cache;
mod client;
pub mod types;

pub use client::CommerceClient;
pub use types::*;

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when interacting with the commerce API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {}", format_api_error(.error))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error details from the response body.
        error: ApiError,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A catalog write was attempted without a secret key.
    #[error("Secret key required for this operation (set CHEC_SECRET_KEY)")]
    MissingSecretKey,
}

impl CommerceError {
    /// The single message shown to shoppers when an operation fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { error, .. } if !error.message.is_empty() => error.message.clone(),
            Self::RateLimited(_) => "The store is busy right now, please try again.".to_string(),
            Self::NotFound(_) => "That item is no longer available.".to_string(),
            _ => "We could not reach the store, please try again.".to_string(),
        }
    }
}

/// Error object returned by the commerce API.
///
/// ```json
/// {
///   "status_code": 422,
///   "error": {
///     "type": "validation",
///     "message": "The given data was invalid.",
///     "errors": { "customer.email": ["The customer.email field is required."] }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    /// Error category (e.g. "validation", "not_found").
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Field validation messages keyed by field path.
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Envelope around [`ApiError`] in error responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiError,
}

impl ApiError {
    /// Parse an error response body, keeping a snippet of unparseable bodies.
    pub(crate) fn from_body(body: &str) -> Self {
        serde_json::from_str::<ApiErrorBody>(body).map_or_else(
            |_| Self {
                message: body.chars().take(200).collect(),
                ..Self::default()
            },
            |parsed| parsed.error,
        )
    }
}

fn format_api_error(error: &ApiError) -> String {
    let mut parts = Vec::new();

    if !error.kind.is_empty() {
        parts.push(format!("[{}]", error.kind));
    }

    if !error.message.is_empty() {
        parts.push(error.message.clone());
    }

    let fields = error
        .errors
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect::<Vec<_>>();
    if !fields.is_empty() {
        parts.push(format!("({})", fields.join("; ")));
    }

    if parts.is_empty() {
        "(no error details provided)".to_string()
    } else {
        parts.join(" ")
    }
}

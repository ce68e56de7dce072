//! Session-held models for the storefront.

pub mod session;

pub use session::{OrderSummary, keys as session_keys};

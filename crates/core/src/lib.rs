//! Vitrine Core - Shared value types.
//!
//! This crate provides the small value types used across the Vitrine
//! components:
//! - `storefront` - Server-rendered shop front over the Chec commerce API
//! - `cli` - Catalog seeding and inspection tools
//!
//! # Architecture
//!
//! The core crate contains only types and parsing - no I/O and no HTTP
//! clients. The commerce service is the source of truth for every entity;
//! these types only give its identifiers and values a checked shape.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, inventory and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

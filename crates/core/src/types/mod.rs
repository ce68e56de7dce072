//! Core types for Vitrine.
//!
//! This module provides type-safe wrappers for the values mirrored from the
//! commerce API.

pub mod email;
pub mod id;
pub mod inventory;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use inventory::{Inventory, StockError, parse_stock};
pub use price::Price;

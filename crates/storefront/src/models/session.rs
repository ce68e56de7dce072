//! Session-related types.
//!
//! Types stored in the visitor session between requests.

use serde::{Deserialize, Serialize};

use vitrine_core::{Email, OrderId, Price};

use crate::commerce::Order;

/// Summary of the last captured order, shown on the confirmation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Remote order ID.
    pub id: OrderId,
    /// Shopper-facing order reference.
    pub reference: String,
    /// Customer first name.
    pub firstname: String,
    /// Email the receipt goes to.
    pub email: String,
    /// Formatted order total, when the remote returned one.
    pub total: Option<String>,
}

impl OrderSummary {
    /// Build the summary from a captured order and the submitted email.
    #[must_use]
    pub fn from_order(order: &Order, email: &Email) -> Self {
        Self {
            id: order.id.clone(),
            reference: if order.customer_reference.is_empty() {
                order.id.to_string()
            } else {
                order.customer_reference.clone()
            },
            firstname: order.customer.firstname.clone(),
            email: email.to_string(),
            total: order.order_value.as_ref().map(Price::display),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the remote cart ID.
    pub const CART_ID: &str = "cart_id";

    /// Key for the summary of the last captured order.
    pub const LAST_ORDER: &str = "last_order";

    /// Key for a one-shot checkout error message.
    pub const CHECKOUT_ERROR: &str = "checkout_error";
}

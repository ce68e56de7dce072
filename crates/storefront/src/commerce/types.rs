//! Domain types for the commerce API.
//!
//! These mirror the JSON shapes returned by the API. Fields the API may
//! omit are `#[serde(default)]` so a sparse response still deserializes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::{
    AssetId, CartId, CheckoutTokenId, Inventory, LineItemId, OrderId, Price, ProductId,
    ShippingMethodId,
};

// =============================================================================
// Product Types
// =============================================================================

/// Product media reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Media type (e.g. "image").
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Media URL.
    #[serde(default)]
    pub source: Option<String>,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID (e.g. `prod_4OANwRr9Q0lvYL`).
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Stock tracking.
    #[serde(default)]
    pub inventory: Inventory,
    /// Primary image.
    #[serde(default)]
    pub media: Media,
    /// HTML description.
    #[serde(default)]
    pub description: Option<String>,
    /// URL-friendly name.
    #[serde(default)]
    pub permalink: Option<String>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    /// Total number of records.
    #[serde(default)]
    pub total: u64,
    /// Records in this page.
    #[serde(default)]
    pub count: u64,
}

/// List metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMeta {
    /// Pagination details.
    #[serde(default)]
    pub pagination: Pagination,
}

/// A page of products.
///
/// The API omits `data` entirely when the catalog is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductList {
    /// Products in this page.
    #[serde(default)]
    pub data: Option<Vec<Product>>,
    /// List metadata.
    #[serde(default)]
    pub meta: ListMeta,
}

impl ProductList {
    /// The products, treating an absent list as empty.
    #[must_use]
    pub fn into_products(self) -> Vec<Product> {
        self.data.unwrap_or_default()
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Stock tracking.
    pub inventory: Inventory,
}

/// Request body wrapper for product creation.
#[derive(Debug, Serialize)]
pub(crate) struct NewProductBody<'a> {
    pub product: &'a NewProduct,
}

// =============================================================================
// Asset Types
// =============================================================================

/// Input for registering a remote image as an asset.
#[derive(Debug, Clone, Serialize)]
pub struct NewAsset {
    /// File name shown in the dashboard.
    pub filename: String,
    /// Public URL of the image.
    pub url: String,
}

/// An uploaded asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Asset ID (e.g. `ast_7ZAMo1Mp7oNJ4x`).
    pub id: AssetId,
    /// Public URL.
    #[serde(default)]
    pub url: Option<String>,
    /// File name.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Reference to an asset when associating it with a product.
#[derive(Debug, Serialize)]
pub(crate) struct AssetRef<'a> {
    pub id: &'a AssetId,
}

/// Request body for associating assets with a product.
#[derive(Debug, Serialize)]
pub(crate) struct AttachAssetsBody<'a> {
    pub assets: Vec<AssetRef<'a>>,
}

// =============================================================================
// Cart Types
// =============================================================================

/// Line item image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemImage {
    /// Image URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// A product entry in a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Line item ID (e.g. `item_7RyWOwmK5nEa2V`).
    pub id: LineItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Product name at the time it was added.
    pub name: String,
    /// Units in the cart.
    pub quantity: u32,
    /// Unit price.
    pub price: Price,
    /// `price * quantity`.
    pub line_total: Price,
    /// Product image.
    #[serde(default)]
    pub image: Option<LineItemImage>,
}

/// Cart currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code.
    #[serde(default)]
    pub code: String,
    /// Display symbol.
    #[serde(default)]
    pub symbol: String,
}

/// A shopping cart owned by the commerce API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Sum of all line item quantities.
    #[serde(default)]
    pub total_items: u32,
    /// Number of distinct line items.
    #[serde(default)]
    pub total_unique_items: u32,
    /// Sum of all line totals.
    #[serde(default)]
    pub subtotal: Price,
    /// Line items.
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    /// Cart currency.
    #[serde(default)]
    pub currency: Currency,
}

/// Response of the cart mutation endpoints, which wrap the updated cart.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CartMutation {
    pub cart: Cart,
}

/// Request body for adding a product to a cart.
#[derive(Debug, Serialize)]
pub(crate) struct AddToCartBody<'a> {
    pub id: &'a ProductId,
    pub quantity: u32,
}

/// Request body for changing a line item quantity.
#[derive(Debug, Serialize)]
pub(crate) struct UpdateQuantityBody {
    pub quantity: u32,
}

// =============================================================================
// Checkout Types
// =============================================================================

/// A line item inside a checkout token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    /// Line item ID (used as key in the capture body).
    pub id: LineItemId,
    /// Product name.
    #[serde(default)]
    pub name: String,
    /// Units ordered.
    pub quantity: u32,
    /// Line total.
    #[serde(default)]
    pub line_total: Price,
}

/// Live totals of a checkout token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutLive {
    /// Sum of line totals.
    #[serde(default)]
    pub subtotal: Price,
    /// Grand total including shipping and tax.
    #[serde(default)]
    pub total: Price,
    /// Line items being purchased.
    #[serde(default)]
    pub line_items: Vec<CheckoutLineItem>,
}

/// A checkout token generated from a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutToken {
    /// Token ID (e.g. `chkt_L5z3kmQpdpkGlA`).
    pub id: CheckoutTokenId,
    /// Live totals.
    #[serde(default)]
    pub live: CheckoutLive,
}

/// A shipping option for a destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Shipping method ID.
    pub id: ShippingMethodId,
    /// Display name (e.g. "Domestic").
    pub description: String,
    /// Shipping cost.
    pub price: Price,
}

/// Response of the countries helper.
#[derive(Debug, Deserialize)]
pub(crate) struct CountriesResponse {
    #[serde(default)]
    pub countries: BTreeMap<String, String>,
}

/// Response of the subdivisions helper.
#[derive(Debug, Deserialize)]
pub(crate) struct SubdivisionsResponse {
    #[serde(default)]
    pub subdivisions: BTreeMap<String, String>,
}

/// Quantity of a line item being captured.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureLineItem {
    /// Units to purchase.
    pub quantity: u32,
}

/// Customer details on capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Email address.
    pub email: String,
}

/// Shipping address on capture.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingDetails {
    /// Recipient name.
    pub name: String,
    /// Street address.
    pub street: String,
    /// City.
    pub town_city: String,
    /// State or province code.
    pub county_state: String,
    /// Postal code.
    pub postal_zip_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// Fulfillment choice on capture.
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentDetails {
    /// Selected shipping method.
    pub shipping_method: ShippingMethodId,
}

/// Card details for the test gateway.
#[derive(Debug, Clone, Serialize)]
pub struct CardDetails {
    /// Card number.
    pub number: String,
    /// Expiry month (MM).
    pub expiry_month: String,
    /// Expiry year (YY).
    pub expiry_year: String,
    /// Card verification code.
    pub cvc: String,
    /// Billing postal code.
    pub postal_zip_code: String,
}

/// Payment details on capture.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    /// Gateway name (e.g. `test_gateway`).
    pub gateway: String,
    /// Card details.
    pub card: CardDetails,
}

/// Request body for capturing a checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureRequest {
    /// Line items keyed by line item ID.
    pub line_items: BTreeMap<LineItemId, CaptureLineItem>,
    /// Customer details.
    pub customer: CustomerDetails,
    /// Shipping address.
    pub shipping: ShippingDetails,
    /// Fulfillment choice.
    pub fulfillment: FulfillmentDetails,
    /// Payment details.
    pub payment: PaymentDetails,
}

impl CaptureRequest {
    /// Line items for a capture, taken from the checkout token.
    #[must_use]
    pub fn line_items_from(token: &CheckoutToken) -> BTreeMap<LineItemId, CaptureLineItem> {
        token
            .live
            .line_items
            .iter()
            .map(|item| {
                (
                    item.id.clone(),
                    CaptureLineItem {
                        quantity: item.quantity,
                    },
                )
            })
            .collect()
    }
}

// =============================================================================
// Order Types
// =============================================================================

/// A captured order (the receipt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// Customer-facing reference (e.g. `CHEC-123456`).
    #[serde(default)]
    pub customer_reference: String,
    /// Customer details.
    pub customer: CustomerDetails,
    /// Total charged.
    #[serde(default)]
    pub order_value: Option<Price>,
    /// Payment status (e.g. "paid").
    #[serde(default)]
    pub status_payment: Option<String>,
}

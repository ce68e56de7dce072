//! Integration tests for Vitrine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vitrine-integration-tests
//! ```
//!
//! No external services are needed. [`FakeCommerce`] serves the parts of
//! the Chec REST API the storefront uses, plus the mock product endpoint,
//! from memory on an ephemeral port. [`TestContext`] runs the real
//! storefront router against it and drives it with a cookie-keeping
//! `reqwest` client.
//!
//! # Test Categories
//!
//! - `catalog_seed` - Seeding and catalog bootstrap
//! - `storefront_cart` - Product grid and cart
//! - `storefront_checkout` - Checkout and confirmation

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

use vitrine_core::{
    AssetId, CartId, CheckoutTokenId, Inventory, LineItemId, OrderId, Price, ProductId,
    ShippingMethodId,
};
use vitrine_storefront::commerce::{
    Asset, Cart, CheckoutLineItem, CheckoutLive, CheckoutToken, CommerceClient, Currency,
    CustomerDetails, LineItem, LineItemImage, Media, Order, Product, ShippingOption,
};
use vitrine_storefront::config::{
    CatalogConfig, CheckoutConfig, CommerceConfig, StorefrontConfig,
};
use vitrine_storefront::state::AppState;

/// Public key the fake accepts for reads, carts, and checkout.
pub const PUBLIC_KEY: &str = "pk_test_vitrine";

/// Secret key the fake accepts for catalog writes.
pub const SECRET_KEY: &str = "sk_test_Q7vX2mN9pL4rT8wK3jH6";

/// Card number the fake gateway declines.
pub const DECLINED_CARD: &str = "4000000000000002";

/// Card number the fake gateway accepts.
pub const TEST_CARD: &str = "4242 4242 4242 4242";

/// Shipping method offered for Brazilian addresses.
pub const DOMESTIC_SHIPPING: &str = "ship_domestic";

/// Shipping method offered for every other country.
pub const INTERNATIONAL_SHIPPING: &str = "ship_international";

const CURRENCY_SYMBOL: &str = "R$";
const CURRENCY_CODE: &str = "BRL";

fn price(raw: Decimal) -> Price {
    Price::from_raw(raw, CURRENCY_SYMBOL, CURRENCY_CODE)
}

// =============================================================================
// Fake commerce API
// =============================================================================

#[derive(Default)]
struct FakeState {
    next_id: u64,
    products: Vec<Product>,
    assets: HashMap<String, String>,
    carts: HashMap<String, Vec<LineItem>>,
    tokens: HashMap<String, String>,
    captures: Vec<Value>,
    seed_rows: Vec<Value>,
    fail_assets: bool,
    fail_deletes: bool,
    deleted: Vec<String>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{:04}", self.next_id)
    }

    fn cart(&self, id: &str) -> Option<Cart> {
        let lines = self.carts.get(id)?;
        let subtotal = lines.iter().map(|l| l.line_total.raw).sum();
        Some(Cart {
            id: CartId::new(id),
            total_items: lines.iter().map(|l| l.quantity).sum(),
            total_unique_items: u32::try_from(lines.len()).unwrap_or(u32::MAX),
            subtotal: price(subtotal),
            line_items: lines.clone(),
            currency: Currency {
                code: CURRENCY_CODE.to_string(),
                symbol: CURRENCY_SYMBOL.to_string(),
            },
        })
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// In-memory stand-in for the Chec REST API and the mock product endpoint.
#[derive(Clone)]
pub struct FakeCommerce {
    state: Shared,
    addr: SocketAddr,
}

impl FakeCommerce {
    /// Start the fake on an ephemeral port.
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = fake_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake commerce API");
        let addr = listener.local_addr().expect("Fake has no local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake commerce API failed");
        });

        Self { state, addr }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("Fake state poisoned")
    }

    /// Base URL of the fake commerce API.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// URL of the fake mock product endpoint.
    #[must_use]
    pub fn seed_url(&self) -> String {
        format!("http://{}/mock/product", self.addr)
    }

    /// Commerce settings pointing at this fake.
    #[must_use]
    pub fn commerce_config(&self, with_secret: bool) -> CommerceConfig {
        CommerceConfig {
            api_url: self.api_url(),
            public_key: PUBLIC_KEY.to_string(),
            secret_key: with_secret.then(|| SecretString::from(SECRET_KEY)),
        }
    }

    /// A commerce client talking to this fake.
    #[must_use]
    pub fn client(&self, with_secret: bool) -> CommerceClient {
        CommerceClient::new(&self.commerce_config(with_secret))
    }

    /// Put a product straight into the catalog.
    pub fn add_product(&self, name: &str, raw_price: Decimal, available: u32) -> ProductId {
        let mut state = self.lock();
        let id = state.next_id("prod");
        state.products.push(Product {
            id: ProductId::new(id.clone()),
            name: name.to_string(),
            price: price(raw_price),
            inventory: Inventory::managed(available),
            media: Media::default(),
            description: None,
            permalink: None,
        });
        ProductId::new(id)
    }

    /// Rows served by the mock product endpoint.
    pub fn set_seed_rows(&self, rows: Vec<Value>) {
        self.lock().seed_rows = rows;
    }

    /// Make asset creation fail.
    pub fn fail_assets(&self, fail: bool) {
        self.lock().fail_assets = fail;
    }

    /// Make product deletion fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// Forget every cart, as if they had expired.
    pub fn expire_carts(&self) {
        self.lock().carts.clear();
    }

    /// Catalog products in creation order.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    /// IDs of products deleted so far.
    #[must_use]
    pub fn deleted_products(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// Capture request bodies received so far.
    #[must_use]
    pub fn captures(&self) -> Vec<Value> {
        self.lock().captures.clone()
    }
}

fn fake_router(state: Shared) -> Router {
    Router::new()
        .route("/mock/product", get(mock_products))
        .route("/v1/products", get(list_products).post(create_product))
        .route("/v1/products/{id}", axum::routing::delete(delete_product))
        .route("/v1/products/{id}/assets", post(attach_assets))
        .route("/v1/assets", post(create_asset))
        .route("/v1/carts", get(create_cart))
        .route("/v1/carts/{id}", get(get_cart).post(add_to_cart))
        .route("/v1/carts/{id}/items", axum::routing::delete(empty_cart))
        .route(
            "/v1/carts/{id}/items/{line_id}",
            put(update_line).delete(remove_line),
        )
        .route("/v1/checkouts/{id}", get(generate_token).post(capture))
        .route(
            "/v1/checkouts/{id}/helper/shipping_options",
            get(shipping_options),
        )
        .route("/v1/services/locale/{code}/countries", get(countries))
        .route("/v1/services/locale/{code}/subdivisions", get(subdivisions))
        .with_state(state)
}

fn api_error(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"type": kind, "message": message}})),
    )
        .into_response()
}

fn not_found() -> Response {
    api_error(StatusCode::NOT_FOUND, "not_found", "Not found")
}

/// Check the `X-Authorization` header.
fn authorize(headers: &HeaderMap, secret: bool) -> Result<(), Response> {
    let key = headers
        .get("X-Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let allowed = key == SECRET_KEY || (!secret && key == PUBLIC_KEY);
    if allowed {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            "You did not provide a valid API key.",
        ))
    }
}

macro_rules! authorized {
    ($headers:expr, $secret:expr) => {
        if let Err(response) = authorize(&$headers, $secret) {
            return response;
        }
    };
}

async fn mock_products(State(state): State<Shared>) -> Json<Vec<Value>> {
    Json(state.lock().expect("Fake state poisoned").seed_rows.clone())
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn list_products(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    authorized!(headers, false);
    let state = state.lock().expect("Fake state poisoned");
    let total = state.products.len();
    let page: Vec<&Product> = state
        .products
        .iter()
        .take(query.limit.unwrap_or(20))
        .collect();

    // Chec leaves `data` out of an empty list
    if page.is_empty() {
        return Json(json!({"meta": {"pagination": {"total": 0, "count": 0}}})).into_response();
    }
    Json(json!({
        "data": page,
        "meta": {"pagination": {"total": total, "count": page.len()}},
    }))
    .into_response()
}

#[derive(Deserialize)]
struct NewProductBody {
    product: NewProductFields,
}

#[derive(Deserialize)]
struct NewProductFields {
    name: String,
    price: Decimal,
    #[serde(default)]
    inventory: Inventory,
}

async fn create_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewProductBody>,
) -> Response {
    authorized!(headers, true);
    let mut state = state.lock().expect("Fake state poisoned");
    let product = Product {
        id: ProductId::new(state.next_id("prod")),
        name: body.product.name,
        price: price(body.product.price),
        inventory: body.product.inventory,
        media: Media::default(),
        description: None,
        permalink: None,
    };
    state.products.push(product.clone());
    (StatusCode::CREATED, Json(product)).into_response()
}

async fn delete_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    authorized!(headers, true);
    let mut state = state.lock().expect("Fake state poisoned");
    if state.fail_deletes {
        return api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Something went wrong.",
        );
    }
    let before = state.products.len();
    state.products.retain(|p| p.id.as_str() != id);
    if state.products.len() == before {
        return not_found();
    }
    state.deleted.push(id.clone());
    Json(json!({"id": id, "deleted": true})).into_response()
}

#[derive(Deserialize)]
struct NewAssetBody {
    filename: String,
    url: String,
}

async fn create_asset(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewAssetBody>,
) -> Response {
    authorized!(headers, true);
    let mut state = state.lock().expect("Fake state poisoned");
    if state.fail_assets {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unprocessable_entity",
            "The asset URL could not be fetched.",
        );
    }
    let id = state.next_id("ast");
    state.assets.insert(id.clone(), body.url.clone());
    Json(Asset {
        id: AssetId::new(id),
        url: Some(body.url),
        filename: Some(body.filename),
    })
    .into_response()
}

#[derive(Deserialize)]
struct AttachBody {
    assets: Vec<AssetRefBody>,
}

#[derive(Deserialize)]
struct AssetRefBody {
    id: String,
}

async fn attach_assets(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AttachBody>,
) -> Response {
    authorized!(headers, true);
    let mut state = state.lock().expect("Fake state poisoned");
    let Some(url) = body
        .assets
        .first()
        .and_then(|asset| state.assets.get(&asset.id).cloned())
    else {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unprocessable_entity",
            "Unknown asset.",
        );
    };
    let Some(product) = state.products.iter_mut().find(|p| p.id.as_str() == id) else {
        return not_found();
    };
    product.media = Media {
        kind: Some("image".to_string()),
        source: Some(url),
    };
    Json(json!({})).into_response()
}

async fn create_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    let id = state.next_id("cart");
    state.carts.insert(id.clone(), Vec::new());
    Json(state.cart(&id)).into_response()
}

async fn get_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    authorized!(headers, false);
    let state = state.lock().expect("Fake state poisoned");
    state
        .cart(&id)
        .map_or_else(not_found, |cart| Json(cart).into_response())
}

fn cart_mutation(state: &FakeState, id: &str) -> Response {
    state
        .cart(id)
        .map_or_else(not_found, |cart| Json(json!({"cart": cart})).into_response())
}

fn line_total(unit: &Price, quantity: u32) -> Price {
    price(unit.raw * Decimal::from(quantity))
}

#[derive(Deserialize)]
struct AddBody {
    id: String,
    quantity: u32,
}

async fn add_to_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AddBody>,
) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    if !state.carts.contains_key(&id) || state.deleted.contains(&body.id) {
        return not_found();
    }
    let Some(product) = state
        .products
        .iter()
        .find(|p| p.id.as_str() == body.id)
        .cloned()
    else {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unprocessable_entity",
            "The product is not available.",
        );
    };
    let line_id = state.next_id("item");
    let Some(lines) = state.carts.get_mut(&id) else {
        return not_found();
    };

    if let Some(line) = lines.iter_mut().find(|l| l.product_id == product.id) {
        line.quantity += body.quantity;
        line.line_total = line_total(&line.price, line.quantity);
    } else {
        lines.push(LineItem {
            id: LineItemId::new(line_id),
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: body.quantity,
            line_total: line_total(&product.price, body.quantity),
            price: product.price.clone(),
            image: product.media.source.clone().map(|url| LineItemImage { url: Some(url) }),
        });
    }
    cart_mutation(&state, &id)
}

#[derive(Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn update_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<QuantityBody>,
) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    let Some(lines) = state.carts.get_mut(&id) else {
        return not_found();
    };
    let Some(index) = lines.iter().position(|l| l.id.as_str() == line_id) else {
        return not_found();
    };
    if body.quantity == 0 {
        lines.remove(index);
    } else if let Some(line) = lines.get_mut(index) {
        line.quantity = body.quantity;
        line.line_total = line_total(&line.price, line.quantity);
    }
    cart_mutation(&state, &id)
}

async fn remove_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, line_id)): Path<(String, String)>,
) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    let Some(lines) = state.carts.get_mut(&id) else {
        return not_found();
    };
    lines.retain(|l| l.id.as_str() != line_id);
    cart_mutation(&state, &id)
}

async fn empty_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    let Some(lines) = state.carts.get_mut(&id) else {
        return not_found();
    };
    lines.clear();
    cart_mutation(&state, &id)
}

async fn generate_token(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(cart_id): Path<String>,
) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    let Some(cart) = state.cart(&cart_id) else {
        return not_found();
    };
    if cart.line_items.is_empty() {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unprocessable_entity",
            "The cart is empty.",
        );
    }

    let token_id = state.next_id("chkt");
    state.tokens.insert(token_id.clone(), cart_id);
    Json(CheckoutToken {
        id: CheckoutTokenId::new(token_id),
        live: CheckoutLive {
            subtotal: cart.subtotal.clone(),
            total: cart.subtotal,
            line_items: cart
                .line_items
                .iter()
                .map(|line| CheckoutLineItem {
                    id: line.id.clone(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    line_total: line.line_total.clone(),
                })
                .collect(),
        },
    })
    .into_response()
}

async fn countries(headers: HeaderMap, Path(_token): Path<String>) -> Response {
    authorized!(headers, false);
    Json(json!({"countries": {"BR": "Brazil", "PT": "Portugal"}})).into_response()
}

async fn subdivisions(headers: HeaderMap, Path(country): Path<String>) -> Response {
    authorized!(headers, false);
    let subdivisions = match country.as_str() {
        "BR" => json!({"RJ": "Rio de Janeiro", "SP": "São Paulo"}),
        "PT" => json!({"11": "Lisboa", "13": "Porto"}),
        _ => json!({}),
    };
    Json(json!({"subdivisions": subdivisions})).into_response()
}

async fn shipping_options(
    headers: HeaderMap,
    Path(_token): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    authorized!(headers, false);
    let option = if query.get("country").map(String::as_str) == Some("BR") {
        ShippingOption {
            id: ShippingMethodId::new(DOMESTIC_SHIPPING),
            description: "Domestic".to_string(),
            price: price(Decimal::new(1000, 2)),
        }
    } else {
        ShippingOption {
            id: ShippingMethodId::new(INTERNATIONAL_SHIPPING),
            description: "International".to_string(),
            price: price(Decimal::new(4500, 2)),
        }
    };
    Json(vec![option]).into_response()
}

fn str_at<'a>(body: &'a Value, pointer: &str) -> &'a str {
    body.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

async fn capture(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(token_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    authorized!(headers, false);
    let mut state = state.lock().expect("Fake state poisoned");
    let Some(cart) = state
        .tokens
        .get(&token_id)
        .and_then(|cart_id| state.cart(cart_id))
    else {
        return not_found();
    };

    if str_at(&body, "/payment/card/number") == DECLINED_CARD {
        return api_error(
            StatusCode::PAYMENT_REQUIRED,
            "gateway_error",
            "Your card was declined.",
        );
    }

    let method = str_at(&body, "/fulfillment/shipping_method");
    if method != DOMESTIC_SHIPPING && method != INTERNATIONAL_SHIPPING {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": {
                "type": "validation",
                "message": "The given data was invalid.",
                "errors": {"fulfillment.shipping_method": ["The selected shipping method is invalid."]},
            }})),
        )
            .into_response();
    }

    let lines_match = cart.line_items.iter().all(|line| {
        body.pointer(&format!("/line_items/{}/quantity", line.id))
            .and_then(Value::as_u64)
            == Some(u64::from(line.quantity))
    });
    if !lines_match {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation",
            "The line items do not match the checkout.",
        );
    }

    for line in &cart.line_items {
        if let Some(product) = state.products.iter_mut().find(|p| p.id == line.product_id) {
            product.inventory.available = product.inventory.available.saturating_sub(line.quantity);
        }
    }
    state.captures.push(body.clone());

    let order_id = state.next_id("ord");
    let reference = format!("VIT-{:06}", state.captures.len());
    Json(Order {
        id: OrderId::new(order_id),
        customer_reference: reference,
        customer: CustomerDetails {
            firstname: str_at(&body, "/customer/firstname").to_string(),
            lastname: str_at(&body, "/customer/lastname").to_string(),
            email: str_at(&body, "/customer/email").to_string(),
        },
        order_value: Some(cart.subtotal),
        status_payment: Some("paid".to_string()),
    })
    .into_response()
}

// =============================================================================
// Storefront test context
// =============================================================================

/// A storefront served on an ephemeral port against a [`FakeCommerce`].
pub struct TestContext {
    pub fake: FakeCommerce,
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestContext {
    /// Start the fake and the storefront.
    pub async fn start() -> Self {
        let fake = FakeCommerce::start().await;

        let config = StorefrontConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            commerce: fake.commerce_config(true),
            catalog: CatalogConfig {
                seed_url: fake.seed_url(),
                seed_on_empty: false,
                list_limit: 50,
            },
            checkout: CheckoutConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let app = vitrine_storefront::app(AppState::new(config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront");
        let addr = listener.local_addr().expect("Storefront has no local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Storefront failed");
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            fake,
            client,
            base_url: format!("http://{addr}"),
        }
    }

    /// Absolute URL of a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a page and return its status and body.
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, String) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed");
        let status = response.status();
        (status, response.text().await.expect("Unreadable body"))
    }

    /// POST a form the way HTMX does.
    pub async fn htmx_post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("POST failed")
    }

    /// POST a plain form.
    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST failed")
    }

    /// Line item IDs of the visitor's cart, in cart order.
    pub async fn cart_line_ids(&self) -> Vec<String> {
        let (_, html) = self.get("/cart").await;
        html.split("name=\"line_item_id\" value=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .step_by(2)
            .map(str::to_owned)
            .collect()
    }
}

/// Location header of a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

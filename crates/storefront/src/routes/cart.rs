//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads;
//! the same endpoints answer plain form posts with a redirect. The cart
//! itself lives in the commerce API and the session only holds its ID.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use vitrine_core::{CartId, LineItemId, Price, ProductId};

use crate::commerce::{Cart, CommerceError, LineItem};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::models::session_keys;
use crate::routes::is_htmx;
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
    pub image_url: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Price::default().display(),
            item_count: 0,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.line_items.iter().map(CartItemView::from).collect(),
            subtotal: cart.subtotal.display(),
            item_count: cart.total_items,
        }
    }
}

impl From<&LineItem> for CartItemView {
    fn from(line: &LineItem) -> Self {
        Self {
            id: line.id.to_string(),
            product_id: line.product_id.to_string(),
            name: line.name.clone(),
            quantity: line.quantity,
            price: line.price.display(),
            line_total: line.line_total.display(),
            image_url: line.image.as_ref().and_then(|img| img.url.clone()),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart ID from the session.
pub(crate) async fn get_cart_id(session: &Session) -> Option<CartId> {
    session
        .get::<CartId>(session_keys::CART_ID)
        .await
        .ok()
        .flatten()
}

/// Set the cart ID in the session.
pub(crate) async fn set_cart_id(
    session: &Session,
    cart_id: &CartId,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART_ID, cart_id).await
}

/// Fetch the visitor's cart, if they have one.
///
/// Fetch failures are logged and treated as no cart. A cart the commerce
/// API no longer knows is dropped from the session.
pub(crate) async fn current_cart(state: &AppState, session: &Session) -> Option<Cart> {
    let cart_id = get_cart_id(session).await?;

    match state.commerce().get_cart(&cart_id).await {
        Ok(cart) => Some(cart),
        Err(CommerceError::NotFound(_)) => {
            tracing::info!(%cart_id, "Cart expired, forgetting it");
            if let Err(e) = session.remove::<CartId>(session_keys::CART_ID).await {
                tracing::warn!(error = %e, "Failed to clear cart ID from session");
            }
            None
        }
        Err(e) => {
            tracing::warn!(%cart_id, error = %e, "Failed to fetch cart");
            None
        }
    }
}

/// Create a cart and remember it in the session.
async fn start_cart(state: &AppState, session: &Session) -> Result<CartId> {
    let cart = state.commerce().create_cart().await?;
    set_cart_id(session, &cart.id).await?;
    tracing::info!(cart_id = %cart.id, "Created cart");
    Ok(cart.id)
}

// =============================================================================
// Forms and Templates
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_item_id: LineItemId,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_item_id: LineItemId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Respond to a cart mutation with the refreshed items fragment, or a
/// redirect to the cart page for plain form posts.
fn cart_changed(headers: &HeaderMap, cart: &Cart) -> Response {
    if is_htmx(headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate {
                cart: CartView::from(cart),
            },
        )
            .into_response()
    } else {
        Redirect::to("/cart").into_response()
    }
}

/// Respond to a mutation on a cart the visitor does not have.
fn no_cart(headers: &HeaderMap) -> Response {
    if is_htmx(headers) {
        CartItemsTemplate {
            cart: CartView::empty(),
        }
        .into_response()
    } else {
        Redirect::to("/cart").into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let cart = current_cart(&state, &session)
        .await
        .map_or_else(CartView::empty, |cart| CartView::from(&cart));

    CartShowTemplate { cart }
}

/// Add a product to the cart.
///
/// Creates a cart on first use. A cart that expired on the commerce side is
/// replaced by a new one.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1);
    add_breadcrumb(
        "cart",
        "Add to cart",
        Some(&[("product_id", form.product_id.as_str())]),
    );

    let cart_id = match get_cart_id(&session).await {
        Some(cart_id) => cart_id,
        None => start_cart(&state, &session).await?,
    };

    let cart = match state
        .commerce()
        .add_to_cart(&cart_id, &form.product_id, quantity)
        .await
    {
        Err(CommerceError::NotFound(path)) => {
            // The product may be the missing resource; keep the cart then.
            if !cart_is_gone(&state, &cart_id).await {
                return Err(CommerceError::NotFound(path).into());
            }
            tracing::info!(%cart_id, "Cart expired, starting a new one");
            let cart_id = start_cart(&state, &session).await?;
            state
                .commerce()
                .add_to_cart(&cart_id, &form.product_id, quantity)
                .await?
        }
        result => result?,
    };

    if is_htmx(&headers) {
        Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.total_items,
            },
        )
            .into_response())
    } else {
        Ok(Redirect::to("/").into_response())
    }
}

/// Whether the commerce API no longer knows the cart.
async fn cart_is_gone(state: &AppState, cart_id: &CartId) -> bool {
    matches!(
        state.commerce().get_cart(cart_id).await,
        Err(CommerceError::NotFound(_))
    )
}

/// Set the quantity of a cart line. Zero removes the line.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let Some(cart_id) = get_cart_id(&session).await else {
        return Ok(no_cart(&headers));
    };
    add_breadcrumb(
        "cart",
        "Update quantity",
        Some(&[("line_item_id", form.line_item_id.as_str())]),
    );

    let cart = state
        .commerce()
        .update_cart_item(&cart_id, &form.line_item_id, form.quantity)
        .await?;
    Ok(cart_changed(&headers, &cart))
}

/// Remove a line from the cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let Some(cart_id) = get_cart_id(&session).await else {
        return Ok(no_cart(&headers));
    };
    add_breadcrumb(
        "cart",
        "Remove line",
        Some(&[("line_item_id", form.line_item_id.as_str())]),
    );

    let cart = state
        .commerce()
        .remove_from_cart(&cart_id, &form.line_item_id)
        .await?;
    Ok(cart_changed(&headers, &cart))
}

/// Remove every line from the cart.
#[instrument(skip(state, session, headers))]
pub async fn empty(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let Some(cart_id) = get_cart_id(&session).await else {
        return Ok(no_cart(&headers));
    };
    add_breadcrumb("cart", "Empty cart", None);

    let cart = state.commerce().empty_cart(&cart_id).await?;
    Ok(cart_changed(&headers, &cart))
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let count = current_cart(&state, &session)
        .await
        .map_or(0, |cart| cart.total_items);

    CartCountTemplate { count }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::commerce::{Currency, LineItemImage};

    fn cart() -> Cart {
        let price = Price::from_raw(Decimal::new(2590, 2), "R$", "BRL");
        Cart {
            id: CartId::new("cart_1"),
            total_items: 3,
            total_unique_items: 1,
            subtotal: Price::from_raw(Decimal::new(7770, 2), "R$", "BRL"),
            line_items: vec![LineItem {
                id: LineItemId::new("item_1"),
                product_id: ProductId::new("prod_1"),
                name: "Caneca".to_string(),
                quantity: 3,
                price: price.clone(),
                line_total: Price::from_raw(Decimal::new(7770, 2), "R$", "BRL"),
                image: Some(LineItemImage {
                    url: Some("https://img.example/caneca.png".to_string()),
                }),
            }],
            currency: Currency {
                code: "BRL".to_string(),
                symbol: "R$".to_string(),
            },
        }
    }

    #[test]
    fn test_cart_view_from_cart() {
        let view = CartView::from(&cart());
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "R$77.70");
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].price, "R$25.90");
        assert_eq!(view.items[0].line_total, "R$77.70");
        assert_eq!(
            view.items[0].image_url.as_deref(),
            Some("https://img.example/caneca.png")
        );
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::empty();
        assert!(view.is_empty());
        assert_eq!(view.item_count, 0);
        assert_eq!(view.subtotal, "0.00");
    }

    #[test]
    fn test_count_fragment_renders_total() {
        let html = CartCountTemplate { count: 3 }.render().unwrap();
        assert!(html.contains('3'));
    }

    #[test]
    fn test_items_fragment_lists_lines() {
        let html = CartItemsTemplate {
            cart: CartView::from(&cart()),
        }
        .render()
        .unwrap();
        assert!(html.contains("Caneca"));
        assert!(html.contains("item_1"));
    }

    #[test]
    fn test_plain_post_redirects_to_cart() {
        let response = cart_changed(&HeaderMap::new(), &cart());
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/cart");
    }
}

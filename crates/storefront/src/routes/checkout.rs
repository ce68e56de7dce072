//! Checkout route handlers.
//!
//! The checkout page generates a checkout token from the visitor's cart and
//! offers the destinations and shipping options the commerce API knows for
//! it. Submitting the form captures the order against a fresh token. Any
//! failure, local or remote, comes back to the form as one message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use vitrine_core::{CartId, Email, ShippingMethodId};

use crate::commerce::{
    CaptureRequest, CardDetails, CustomerDetails, FulfillmentDetails, Order, PaymentDetails,
    ShippingDetails, ShippingOption,
};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::models::{OrderSummary, session_keys};
use crate::routes::cart::{CartView, current_cart, get_cart_id, set_cart_id};
use crate::state::AppState;

/// An `<option>` of a select box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Destination chosen on the checkout page.
#[derive(Debug, Default, Deserialize)]
pub struct DestinationQuery {
    pub country: Option<String>,
    pub region: Option<String>,
}

/// Checkout form data.
///
/// Every field defaults to empty so a blank or missing field is reported
/// through the checkout error message instead of a form rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub street: String,
    pub town_city: String,
    pub postal_zip_code: String,
    pub country: String,
    pub county_state: String,
    pub shipping_method: String,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvc: String,
    pub billing_postal_zip_code: String,
}

impl CheckoutForm {
    /// Check the fields the capture cannot do without.
    ///
    /// Returns the parsed email, or the message to show the shopper.
    fn validate(&self) -> std::result::Result<Email, String> {
        let required = [
            (&self.firstname, "first name"),
            (&self.lastname, "last name"),
            (&self.street, "street address"),
            (&self.town_city, "city"),
            (&self.postal_zip_code, "postal code"),
            (&self.country, "country"),
            (&self.card_number, "card number"),
            (&self.expiry_month, "card expiry month"),
            (&self.expiry_year, "card expiry year"),
            (&self.cvc, "card security code"),
            (&self.billing_postal_zip_code, "billing postal code"),
        ];
        if let Some((_, label)) = required.iter().find(|(value, _)| value.trim().is_empty()) {
            return Err(format!("Please enter your {label}."));
        }

        let email = Email::parse(&self.email).map_err(|e| e.to_string())?;
        if self.shipping_method.trim().is_empty() {
            return Err("Please choose a shipping method.".to_string());
        }
        Ok(email)
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutShowTemplate {
    pub cart: CartView,
    pub total: String,
    pub countries: Vec<SelectOption>,
    pub subdivisions: Vec<SelectOption>,
    pub shipping_options: Vec<SelectOption>,
    pub country: String,
    pub region: String,
    pub error: Option<String>,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub order: OrderSummary,
}

/// Pick `wanted` when it is one of the `(code, name)` pairs, the first pair
/// otherwise.
fn pick_code(pairs: &[(String, String)], wanted: Option<&str>) -> Option<String> {
    wanted
        .and_then(|w| pairs.iter().find(|(code, _)| code == w))
        .or_else(|| pairs.first())
        .map(|(code, _)| code.clone())
}

/// Build select options from `(code, name)` pairs.
fn select_options(pairs: Vec<(String, String)>, selected: &str) -> Vec<SelectOption> {
    pairs
        .into_iter()
        .map(|(value, label)| SelectOption {
            selected: value == selected,
            value,
            label,
        })
        .collect()
}

/// Build select options from shipping options, selecting the first.
fn shipping_select(options: &[ShippingOption]) -> Vec<SelectOption> {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| SelectOption {
            value: option.id.to_string(),
            label: format!("{} ({})", option.description, option.price.display()),
            selected: i == 0,
        })
        .collect()
}

/// Take the one-shot checkout error from the session.
async fn take_error(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::CHECKOUT_ERROR)
        .await
        .ok()
        .flatten()
}

/// Display the checkout form.
///
/// Visitors without a non-empty cart are sent back to the cart page.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<DestinationQuery>,
) -> Result<Response> {
    let Some(cart) = current_cart(&state, &session).await else {
        return Ok(Redirect::to("/cart").into_response());
    };
    if cart.line_items.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let commerce = state.commerce();
    let token = commerce.generate_checkout_token(&cart.id).await?;

    let countries = commerce
        .shipping_countries(&token.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to fetch shipping countries");
            Vec::new()
        });
    let country = pick_code(&countries, query.country.as_deref()).unwrap_or_default();

    let subdivisions = if country.is_empty() {
        Vec::new()
    } else {
        commerce
            .shipping_subdivisions(&country)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%country, error = %e, "Failed to fetch subdivisions");
                Vec::new()
            })
    };
    let region = pick_code(&subdivisions, query.region.as_deref()).unwrap_or_default();

    let shipping_options = if country.is_empty() {
        Vec::new()
    } else {
        let region = Some(region.as_str()).filter(|r| !r.is_empty());
        commerce
            .shipping_options(&token.id, &country, region)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%country, error = %e, "Failed to fetch shipping options");
                Vec::new()
            })
    };

    Ok(CheckoutShowTemplate {
        cart: CartView::from(&cart),
        total: token.live.total.display(),
        countries: select_options(countries, &country),
        subdivisions: select_options(subdivisions, &region),
        shipping_options: shipping_select(&shipping_options),
        country,
        region,
        error: take_error(&session).await,
    }
    .into_response())
}

/// Capture the order.
///
/// On success the order summary is stored for the confirmation page and the
/// visitor gets a fresh cart. On failure the message is flashed back to the
/// form.
#[instrument(skip(state, session, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let Some(cart_id) = get_cart_id(&session).await else {
        return Ok(Redirect::to("/cart").into_response());
    };
    add_breadcrumb("checkout", "Submit checkout", Some(&[("cart_id", cart_id.as_str())]));

    match place_order(&state, &cart_id, form).await {
        Ok((order, email)) => {
            tracing::info!(order_id = %order.id, "Order captured");
            session
                .insert(
                    session_keys::LAST_ORDER,
                    OrderSummary::from_order(&order, &email),
                )
                .await?;
            replace_cart(&state, &session).await?;
            // Stock changed on the remote.
            state.commerce().invalidate_catalog();
            Ok(Redirect::to("/checkout/confirmation").into_response())
        }
        Err(message) => {
            tracing::warn!(%cart_id, error = %message, "Checkout failed");
            session
                .insert(session_keys::CHECKOUT_ERROR, message)
                .await?;
            Ok(Redirect::to("/checkout").into_response())
        }
    }
}

/// Validate the form and capture it against a fresh checkout token.
///
/// Returns the message to show the shopper on failure.
async fn place_order(
    state: &AppState,
    cart_id: &CartId,
    form: CheckoutForm,
) -> std::result::Result<(Order, Email), String> {
    let email = form.validate()?;

    let commerce = state.commerce();
    let token = commerce
        .generate_checkout_token(cart_id)
        .await
        .map_err(|e| e.user_message())?;

    let capture = CaptureRequest {
        line_items: CaptureRequest::line_items_from(&token),
        customer: CustomerDetails {
            firstname: form.firstname.trim().to_string(),
            lastname: form.lastname.trim().to_string(),
            email: email.to_string(),
        },
        shipping: ShippingDetails {
            name: format!("{} {}", form.firstname.trim(), form.lastname.trim()),
            street: form.street,
            town_city: form.town_city,
            county_state: form.county_state,
            postal_zip_code: form.postal_zip_code,
            country: form.country,
        },
        fulfillment: FulfillmentDetails {
            shipping_method: ShippingMethodId::new(form.shipping_method),
        },
        payment: PaymentDetails {
            gateway: state.config().checkout.payment_gateway.clone(),
            card: CardDetails {
                number: form.card_number.split_whitespace().collect(),
                expiry_month: form.expiry_month,
                expiry_year: form.expiry_year,
                cvc: form.cvc,
                postal_zip_code: form.billing_postal_zip_code,
            },
        },
    };

    add_breadcrumb("checkout", "Capture order", Some(&[("token", token.id.as_str())]));
    let order = commerce
        .capture_checkout(&token.id, &capture)
        .await
        .map_err(|e| e.user_message())?;
    Ok((order, email))
}

/// Swap the captured cart for a new one.
///
/// When no new cart can be created the old ID is dropped, and the next add
/// to cart creates one.
async fn replace_cart(state: &AppState, session: &Session) -> Result<()> {
    match state.commerce().refresh_cart().await {
        Ok(cart) => set_cart_id(session, &cart.id).await?,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to refresh cart after checkout");
            session.remove::<CartId>(session_keys::CART_ID).await?;
        }
    }
    Ok(())
}

/// Display the receipt for the last captured order.
#[instrument(skip(session))]
pub async fn confirmation(session: Session) -> Result<Response> {
    let Some(order) = session
        .get::<OrderSummary>(session_keys::LAST_ORDER)
        .await?
    else {
        return Ok(Redirect::to("/").into_response());
    };

    Ok(ConfirmationTemplate { order }.into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use vitrine_core::{OrderId, Price};

    use super::*;

    fn pairs() -> Vec<(String, String)> {
        vec![
            ("BR".to_string(), "Brazil".to_string()),
            ("PT".to_string(), "Portugal".to_string()),
        ]
    }

    #[test]
    fn test_pick_code_prefers_known_choice() {
        assert_eq!(pick_code(&pairs(), Some("PT")).as_deref(), Some("PT"));
    }

    #[test]
    fn test_pick_code_falls_back_to_first() {
        assert_eq!(pick_code(&pairs(), Some("XX")).as_deref(), Some("BR"));
        assert_eq!(pick_code(&pairs(), None).as_deref(), Some("BR"));
        assert_eq!(pick_code(&[], Some("BR")), None);
    }

    #[test]
    fn test_select_options_marks_selection() {
        let options = select_options(pairs(), "PT");
        assert!(!options[0].selected);
        assert!(options[1].selected);
        assert_eq!(options[1].label, "Portugal");
    }

    #[test]
    fn test_shipping_select_labels_price() {
        let options = shipping_select(&[ShippingOption {
            id: ShippingMethodId::new("ship_1"),
            description: "Domestic".to_string(),
            price: Price::from_raw(Decimal::new(1000, 2), "R$", "BRL"),
        }]);
        assert_eq!(options[0].value, "ship_1");
        assert_eq!(options[0].label, "Domestic (R$10.00)");
        assert!(options[0].selected);
    }

    fn filled_form() -> CheckoutForm {
        CheckoutForm {
            firstname: "Ana".to_string(),
            lastname: "Souza".to_string(),
            email: "ana@example.com".to_string(),
            street: "Rua das Flores 10".to_string(),
            town_city: "Rio de Janeiro".to_string(),
            postal_zip_code: "20000-000".to_string(),
            country: "BR".to_string(),
            county_state: "RJ".to_string(),
            shipping_method: "ship_domestic".to_string(),
            card_number: "4242 4242 4242 4242".to_string(),
            expiry_month: "01".to_string(),
            expiry_year: "2030".to_string(),
            cvc: "123".to_string(),
            billing_postal_zip_code: "20000-000".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_filled_form() {
        let email = filled_form().validate().unwrap();
        assert_eq!(email.to_string(), "ana@example.com");
    }

    #[test]
    fn test_validate_reports_blank_field() {
        let form = CheckoutForm {
            street: "  ".to_string(),
            ..filled_form()
        };
        assert_eq!(
            form.validate().unwrap_err(),
            "Please enter your street address."
        );
    }

    #[test]
    fn test_validate_requires_shipping_method() {
        let form = CheckoutForm {
            shipping_method: String::new(),
            ..filled_form()
        };
        assert_eq!(
            form.validate().unwrap_err(),
            "Please choose a shipping method."
        );
    }

    #[tokio::test]
    async fn test_partial_form_is_accepted() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        let request = Request::builder()
            .method("POST")
            .uri("/checkout")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("firstname=Ana&email=ana%40example.com"))
            .unwrap();
        let Form(form) = Form::<CheckoutForm>::from_request(request, &()).await.unwrap();
        assert_eq!(form.firstname, "Ana");
        assert!(form.lastname.is_empty());
        assert_eq!(
            form.validate().unwrap_err(),
            "Please enter your last name."
        );
    }

    #[test]
    fn test_checkout_template_shows_error() {
        let html = CheckoutShowTemplate {
            cart: CartView::empty(),
            total: "R$10.00".to_string(),
            countries: select_options(pairs(), "BR"),
            subdivisions: Vec::new(),
            shipping_options: Vec::new(),
            country: "BR".to_string(),
            region: String::new(),
            error: Some("Your card was declined.".to_string()),
        }
        .render()
        .unwrap();
        assert!(html.contains("Your card was declined."));
        assert!(html.contains("Brazil"));
    }

    #[test]
    fn test_confirmation_template_shows_reference() {
        let html = ConfirmationTemplate {
            order: OrderSummary {
                id: OrderId::new("ord_1"),
                reference: "VIT-0001".to_string(),
                firstname: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                total: Some("R$49.90".to_string()),
            },
        }
        .render()
        .unwrap();
        assert!(html.contains("VIT-0001"));
        assert!(html.contains("ana@example.com"));
    }
}

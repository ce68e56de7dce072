//! Integration tests for checkout and order confirmation.
//!
//! Each test starts its own storefront against a fresh fake commerce API.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use rust_decimal::Decimal;

use vitrine_integration_tests::{
    DECLINED_CARD, DOMESTIC_SHIPPING, INTERNATIONAL_SHIPPING, TEST_CARD, TestContext, location,
};

/// Start a storefront with one product and a cart holding two of it.
async fn context_with_cart() -> TestContext {
    let ctx = TestContext::start().await;
    let product = ctx.fake.add_product("Caneca", Decimal::new(2590, 2), 10);
    let response = ctx
        .htmx_post("/cart/add", &[("product_id", product.as_str()), ("quantity", "2")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    ctx
}

fn checkout_form<'a>(email: &'a str, card: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("firstname", "Ana"),
        ("lastname", "Souza"),
        ("email", email),
        ("street", "Rua Augusta 100"),
        ("town_city", "São Paulo"),
        ("postal_zip_code", "01305-000"),
        ("country", "BR"),
        ("county_state", "SP"),
        ("shipping_method", DOMESTIC_SHIPPING),
        ("card_number", card),
        ("expiry_month", "12"),
        ("expiry_year", "30"),
        ("cvc", "123"),
        ("billing_postal_zip_code", "01305-000"),
    ]
}

#[tokio::test]
async fn test_checkout_requires_items() {
    let ctx = TestContext::start().await;

    let response = ctx.client.get(ctx.url("/checkout")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart");
}

#[tokio::test]
async fn test_checkout_form_offers_destinations() {
    let ctx = context_with_cart().await;

    let (status, html) = ctx.get("/checkout").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Brazil"));
    assert!(html.contains("Portugal"));
    assert!(html.contains("Rio de Janeiro"));
    assert!(html.contains(DOMESTIC_SHIPPING));
    assert!(html.contains("R$51.80"));
}

#[tokio::test]
async fn test_checkout_destination_changes_shipping_options() {
    let ctx = context_with_cart().await;

    let (_, html) = ctx.get("/checkout?country=PT&region=13").await;

    assert!(html.contains("Porto"));
    assert!(html.contains(INTERNATIONAL_SHIPPING));
    assert!(!html.contains(DOMESTIC_SHIPPING));
}

#[tokio::test]
async fn test_successful_checkout() {
    let ctx = context_with_cart().await;

    let response = ctx
        .post("/checkout", &checkout_form("ana@example.com", TEST_CARD))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout/confirmation");

    let (status, html) = ctx.get("/checkout/confirmation").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Ana"));
    assert!(html.contains("VIT-000001"));
    assert!(html.contains("ana@example.com"));

    // The capture carried the token's line items and the configured gateway
    let captures = ctx.fake.captures();
    assert_eq!(captures.len(), 1);
    let capture = &captures[0];
    let quantities: Vec<u64> = capture["line_items"]
        .as_object()
        .unwrap()
        .values()
        .map(|item| item["quantity"].as_u64().unwrap())
        .collect();
    assert_eq!(quantities, vec![2]);
    assert_eq!(capture["payment"]["gateway"], "test_gateway");
    assert_eq!(capture["payment"]["card"]["number"], "4242424242424242");
    assert_eq!(capture["shipping"]["name"], "Ana Souza");

    // Stock went down by the purchased quantity
    assert_eq!(ctx.fake.products()[0].inventory.available, 8);

    // The visitor starts over with a fresh, empty cart
    let (_, badge) = ctx.get("/cart/count").await;
    assert!(badge.contains(">0<"));
}

#[tokio::test]
async fn test_product_grid_shows_stock_after_checkout() {
    let ctx = context_with_cart().await;

    let (_, html) = ctx.get("/").await;
    assert!(html.contains("10 in stock"));

    let response = ctx
        .post("/checkout", &checkout_form("ana@example.com", TEST_CARD))
        .await;
    assert_eq!(location(&response), "/checkout/confirmation");

    let (_, html) = ctx.get("/").await;
    assert!(html.contains("8 in stock"));
    assert!(!html.contains("10 in stock"));
}

#[tokio::test]
async fn test_missing_fields_flash_error() {
    let ctx = context_with_cart().await;

    let response = ctx
        .post("/checkout", &[("firstname", "Ana"), ("email", "ana@example.com")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout");

    let (_, html) = ctx.get("/checkout").await;
    assert!(html.contains("Please enter your last name."));
    assert!(ctx.fake.captures().is_empty());
}

#[tokio::test]
async fn test_declined_card_flashes_error_once() {
    let ctx = context_with_cart().await;

    let response = ctx
        .post("/checkout", &checkout_form("ana@example.com", DECLINED_CARD))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout");

    let (_, html) = ctx.get("/checkout").await;
    assert!(html.contains("Your card was declined."));

    let (_, html) = ctx.get("/checkout").await;
    assert!(!html.contains("Your card was declined."));

    // The cart is untouched
    let (_, badge) = ctx.get("/cart/count").await;
    assert!(badge.contains(">2<"));
}

#[tokio::test]
async fn test_invalid_email_is_rejected_locally() {
    let ctx = context_with_cart().await;

    let response = ctx
        .post("/checkout", &checkout_form("ana.example.com", TEST_CARD))
        .await;
    assert_eq!(location(&response), "/checkout");

    let (_, html) = ctx.get("/checkout").await;
    assert!(html.contains("class=\"alert\""));
    assert!(ctx.fake.captures().is_empty());
}

#[tokio::test]
async fn test_remote_validation_message_is_shown() {
    let ctx = context_with_cart().await;

    let mut form = checkout_form("ana@example.com", TEST_CARD);
    for field in &mut form {
        if field.0 == "shipping_method" {
            field.1 = "ship_unknown";
        }
    }
    ctx.post("/checkout", &form).await;

    let (_, html) = ctx.get("/checkout").await;
    assert!(html.contains("The given data was invalid."));
    assert!(ctx.fake.captures().is_empty());
}

#[tokio::test]
async fn test_confirmation_without_order_redirects_home() {
    let ctx = TestContext::start().await;

    let response = ctx
        .client
        .get(ctx.url("/checkout/confirmation"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

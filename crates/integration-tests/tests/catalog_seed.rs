//! Integration tests for catalog seeding and the startup bootstrap.
//!
//! Each test runs against its own in-memory fake of the commerce API.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::{Value, json};

use vitrine_integration_tests::FakeCommerce;
use vitrine_storefront::catalog::{self, CatalogError, CatalogStatus, SeedSource, SeedStage};
use vitrine_storefront::commerce::CommerceError;
use vitrine_storefront::config::CatalogConfig;

fn mock_rows() -> Vec<Value> {
    vec![
        json!({
            "id": "1",
            "createdAt": "2019-09-02T14:31:31.233Z",
            "name": "Rustic Metal Fish",
            "price": "659.00",
            "image": "http://lorempixel.com/640/480/food",
            "stock": 98548
        }),
        json!({
            "id": "2",
            "name": "Handcrafted Wooden Chair",
            "price": "120.50",
            "image": "http://lorempixel.com/640/480/furniture",
            "stock": "12abc"
        }),
    ]
}

fn catalog_config(fake: &FakeCommerce, seed_on_empty: bool) -> CatalogConfig {
    CatalogConfig {
        seed_url: fake.seed_url(),
        seed_on_empty,
        list_limit: 50,
    }
}

// =============================================================================
// Seeding
// =============================================================================

#[tokio::test]
async fn test_seed_creates_products_with_images() {
    let fake = FakeCommerce::start().await;
    let client = fake.client(true);

    let report = catalog::seed_catalog(&client, mock_rows()).await;

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.created.len(), 2);

    let products = fake.products();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].name, "Rustic Metal Fish");
    assert_eq!(products[0].price.raw, Decimal::new(65900, 2));
    assert!(products[0].inventory.managed);
    assert_eq!(products[0].inventory.available, 98_548);
    assert_eq!(
        products[0].media.source.as_deref(),
        Some("http://lorempixel.com/640/480/food")
    );

    // Leading digits of a numeric string are kept
    assert_eq!(products[1].inventory.available, 12);
}

#[tokio::test]
async fn test_unreadable_row_is_reported_and_skipped() {
    let fake = FakeCommerce::start().await;
    let client = fake.client(true);

    let mut rows = mock_rows();
    rows.insert(
        1,
        json!({"id": "9", "name": "Mystery Box", "price": "10.00", "stock": "many"}),
    );

    let report = catalog::seed_catalog(&client, rows).await;

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "Mystery Box");
    assert_eq!(report.failures[0].stage, SeedStage::Parse);
    assert_eq!(fake.products().len(), 2);
}

#[tokio::test]
async fn test_product_without_image_skips_asset_steps() {
    let fake = FakeCommerce::start().await;
    fake.fail_assets(true);
    let client = fake.client(true);

    let rows = vec![json!({"name": "Caneca", "price": 25.9, "stock": 4})];
    let report = catalog::seed_catalog(&client, rows).await;

    assert!(report.is_success());
    assert!(fake.products()[0].media.source.is_none());
}

#[tokio::test]
async fn test_failed_asset_removes_half_created_product() {
    let fake = FakeCommerce::start().await;
    fake.fail_assets(true);
    let client = fake.client(true);

    let report = catalog::seed_catalog(&client, mock_rows()).await;

    assert!(report.created.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert!(
        report
            .failures
            .iter()
            .all(|f| f.stage == SeedStage::CreateAsset && f.orphan.is_none())
    );
    assert!(report.failures[0].error.contains("could not be fetched"));
    assert!(fake.products().is_empty());
    assert_eq!(fake.deleted_products().len(), 2);
}

#[tokio::test]
async fn test_failed_cleanup_reports_orphan() {
    let fake = FakeCommerce::start().await;
    fake.fail_assets(true);
    fake.fail_deletes(true);
    let client = fake.client(true);

    let report = catalog::seed_catalog(&client, mock_rows()).await;

    let orphans: Vec<_> = report.orphans().collect();
    assert_eq!(orphans.len(), 2);
    assert_eq!(fake.products().len(), 2);
    assert_eq!(orphans[0], &fake.products()[0].id);
}

#[tokio::test]
async fn test_seed_from_remote_source() {
    let fake = FakeCommerce::start().await;
    fake.set_seed_rows(mock_rows());
    let client = fake.client(true);

    let report = catalog::seed_from_source(&client, &SeedSource::Remote(fake.seed_url()))
        .await
        .expect("seeding failed");

    assert_eq!(report.created.len(), 2);
    assert_eq!(client.list_products(50).await.expect("list failed").len(), 2);
}

#[tokio::test]
async fn test_seed_requires_secret_key() {
    let fake = FakeCommerce::start().await;
    fake.set_seed_rows(mock_rows());
    let client = fake.client(false);

    let result = catalog::seed_from_source(&client, &SeedSource::Remote(fake.seed_url())).await;

    assert!(matches!(
        result,
        Err(CatalogError::Commerce(CommerceError::MissingSecretKey))
    ));
    assert!(fake.products().is_empty());
}

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn test_ensure_catalog_leaves_populated_catalog_alone() {
    let fake = FakeCommerce::start().await;
    fake.add_product("Caneca", Decimal::new(2590, 2), 4);
    fake.set_seed_rows(mock_rows());
    let client = fake.client(true);

    let status = catalog::ensure_catalog(&client, &catalog_config(&fake, true))
        .await
        .expect("bootstrap failed");

    assert!(matches!(status, CatalogStatus::Ready(1)));
    assert_eq!(fake.products().len(), 1);
}

#[tokio::test]
async fn test_ensure_catalog_seeds_empty_catalog() {
    let fake = FakeCommerce::start().await;
    fake.set_seed_rows(mock_rows());
    let client = fake.client(true);

    let status = catalog::ensure_catalog(&client, &catalog_config(&fake, true))
        .await
        .expect("bootstrap failed");

    match status {
        CatalogStatus::Seeded(report) => assert_eq!(report.created.len(), 2),
        other => panic!("expected a seeded catalog, got {other:?}"),
    }
    assert_eq!(client.list_products(50).await.expect("list failed").len(), 2);
}

#[tokio::test]
async fn test_ensure_catalog_respects_disabled_seeding() {
    let fake = FakeCommerce::start().await;
    fake.set_seed_rows(mock_rows());
    let client = fake.client(true);

    let status = catalog::ensure_catalog(&client, &catalog_config(&fake, false))
        .await
        .expect("bootstrap failed");

    assert!(matches!(status, CatalogStatus::Empty));
    assert!(fake.products().is_empty());
}

#[tokio::test]
async fn test_ensure_catalog_without_secret_key() {
    let fake = FakeCommerce::start().await;
    fake.set_seed_rows(mock_rows());
    let client = fake.client(false);

    let status = catalog::ensure_catalog(&client, &catalog_config(&fake, true))
        .await
        .expect("bootstrap failed");

    assert!(matches!(status, CatalogStatus::Empty));
}

//! Seed the catalog with products from the mock endpoint or a file.
//!
//! Each product is created, its image registered as an asset, and the asset
//! attached to it. Products that fail are listed at the end; the command
//! fails when any did.

use std::path::PathBuf;

use tracing::{error, info, warn};

use vitrine_storefront::catalog::{self, SeedSource};
use vitrine_storefront::config::CatalogConfig;

use super::commerce_client;

/// Seed the catalog.
///
/// # Errors
///
/// Returns an error if configuration is missing, the source cannot be
/// loaded, or any product failed to seed.
pub async fn run(
    source_url: Option<String>,
    file: Option<PathBuf>,
    only_if_empty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = commerce_client()?;
    let config = CatalogConfig::from_env()?;

    if only_if_empty {
        let existing = client.list_products(1).await?;
        if !existing.is_empty() {
            info!("Catalog already has products, nothing to seed");
            return Ok(());
        }
    }

    let source = match (file, source_url) {
        (Some(path), _) => SeedSource::File(path),
        (None, Some(url)) => SeedSource::Remote(url),
        (None, None) => SeedSource::Remote(config.seed_url),
    };

    info!(source = %source, "Seeding catalog");
    let report = catalog::seed_from_source(&client, &source).await?;

    info!("Seeding complete!");
    info!("  Products created: {}", report.created.len());
    info!("  Products failed: {}", report.failures.len());

    for failure in &report.failures {
        error!(
            "    - {} ({}): {}",
            failure.name, failure.stage, failure.error
        );
    }
    for orphan in report.orphans() {
        warn!("  Product left without image, delete it manually: {orphan}");
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} products failed to seed", report.failures.len()).into())
    }
}

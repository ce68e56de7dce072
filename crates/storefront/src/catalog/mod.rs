//! Catalog seeding.
//!
//! Copies products from a seed source (the mock product endpoint, or a local
//! YAML/JSON file) into the commerce API. Each product goes through three
//! calls:
//!
//! 1. create the product (name, price, managed inventory)
//! 2. register its image URL as an asset
//! 3. associate the asset with the product
//!
//! The calls are not atomic on the remote side. When step 2 or 3 fails the
//! half-created product is deleted again, and if that delete fails too the
//! product ID is reported as an orphan so an operator can remove it.

mod source;

pub use source::{SeedProduct, SeedSource};

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use vitrine_core::{Inventory, ProductId};

use crate::commerce::{CommerceClient, CommerceError, NewAsset, NewProduct};
use crate::config::CatalogConfig;

/// Errors that stop a seeding run before any product is processed.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Fetching the seed source failed.
    #[error("Seed source request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading a seed file failed.
    #[error("Seed file error: {0}")]
    Io(#[from] std::io::Error),

    /// A seed file is not a YAML/JSON list.
    #[error("Seed file is not a list of products: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The commerce API rejected a catalog read.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),
}

/// Step of the seeding chain at which a product failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStage {
    /// The seed row could not be read.
    Parse,
    /// Creating the product failed.
    CreateProduct,
    /// Registering the image asset failed.
    CreateAsset,
    /// Associating the asset with the product failed.
    AttachAsset,
}

impl fmt::Display for SeedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse",
            Self::CreateProduct => "create product",
            Self::CreateAsset => "create asset",
            Self::AttachAsset => "attach asset",
        })
    }
}

/// A product that could not be seeded.
#[derive(Debug, Clone)]
pub struct SeedFailure {
    /// Product name (or `#n` when the row has none).
    pub name: String,
    /// Step that failed.
    pub stage: SeedStage,
    /// Error message.
    pub error: String,
    /// Product left behind on the remote when the compensating delete failed.
    pub orphan: Option<ProductId>,
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    /// Products created with their image attached.
    pub created: Vec<ProductId>,
    /// Products that failed, in seed order.
    pub failures: Vec<SeedFailure>,
}

impl SeedReport {
    /// Whether every product was seeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Products left on the remote without their image.
    pub fn orphans(&self) -> impl Iterator<Item = &ProductId> {
        self.failures.iter().filter_map(|f| f.orphan.as_ref())
    }
}

/// State of the catalog after [`ensure_catalog`].
#[derive(Debug)]
pub enum CatalogStatus {
    /// The catalog already had products.
    Ready(usize),
    /// The catalog was empty and has been seeded.
    Seeded(SeedReport),
    /// The catalog is empty and seeding is disabled or impossible.
    Empty,
}

/// Make sure the catalog has products, seeding it when it is empty.
///
/// Seeding only happens when `seed_on_empty` is set and the client holds a
/// secret key.
///
/// # Errors
///
/// Returns an error if the catalog cannot be listed or the seed source
/// cannot be loaded.
#[instrument(skip(client, config))]
pub async fn ensure_catalog(
    client: &CommerceClient,
    config: &CatalogConfig,
) -> Result<CatalogStatus, CatalogError> {
    let existing = client.list_products(config.list_limit).await?;
    if !existing.is_empty() {
        info!(count = existing.len(), "Catalog already populated");
        return Ok(CatalogStatus::Ready(existing.len()));
    }

    if !config.seed_on_empty {
        info!("Catalog is empty and seeding on empty is disabled");
        return Ok(CatalogStatus::Empty);
    }

    if !client.has_secret_key() {
        warn!("Catalog is empty but no secret key is configured, skipping seed");
        return Ok(CatalogStatus::Empty);
    }

    let source = SeedSource::Remote(config.seed_url.clone());
    let report = seed_from_source(client, &source).await?;
    Ok(CatalogStatus::Seeded(report))
}

/// Load a seed source and seed every product in it.
///
/// # Errors
///
/// Returns an error if no secret key is configured or the source cannot be
/// loaded. Per-product failures are collected in the report instead.
pub async fn seed_from_source(
    client: &CommerceClient,
    source: &SeedSource,
) -> Result<SeedReport, CatalogError> {
    if !client.has_secret_key() {
        return Err(CommerceError::MissingSecretKey.into());
    }

    let rows = source.load().await?;
    info!(source = %source, products = rows.len(), "Loaded seed source");
    Ok(seed_catalog(client, rows).await)
}

/// Seed products one at a time, in order.
#[instrument(skip(client, rows), fields(rows = rows.len()))]
pub async fn seed_catalog(client: &CommerceClient, rows: Vec<Value>) -> SeedReport {
    let mut report = SeedReport::default();

    for (index, row) in rows.into_iter().enumerate() {
        let label = row
            .get("name")
            .and_then(Value::as_str)
            .map_or_else(|| format!("#{}", index + 1), str::to_owned);

        let product = match SeedProduct::from_value(row) {
            Ok(product) => product,
            Err(e) => {
                warn!(product = %label, error = %e, "Skipping unreadable seed row");
                report.failures.push(SeedFailure {
                    name: label,
                    stage: SeedStage::Parse,
                    error: e.to_string(),
                    orphan: None,
                });
                continue;
            }
        };

        match seed_product(client, &product).await {
            Ok(id) => {
                info!(product = %product.name, product_id = %id, "Product seeded");
                report.created.push(id);
            }
            Err(failure) => report.failures.push(failure),
        }
    }

    client.invalidate_catalog();

    info!(
        created = report.created.len(),
        failed = report.failures.len(),
        "Seeding finished"
    );
    report
}

/// Run the create/asset/attach chain for one product.
async fn seed_product(
    client: &CommerceClient,
    product: &SeedProduct,
) -> Result<ProductId, SeedFailure> {
    let failure = |stage: SeedStage, error: &CommerceError, orphan: Option<ProductId>| {
        SeedFailure {
            name: product.name.clone(),
            stage,
            error: error.to_string(),
            orphan,
        }
    };

    let new_product = NewProduct {
        name: product.name.clone(),
        price: product.price,
        inventory: Inventory::managed(product.stock),
    };
    let created = client
        .create_product(&new_product)
        .await
        .map_err(|e| {
            error!(product = %product.name, error = %e, "Product creation failed");
            failure(SeedStage::CreateProduct, &e, None)
        })?;

    let Some(image) = product.image.as_deref() else {
        return Ok(created.id);
    };

    let attached: Result<(), (SeedStage, CommerceError)> = async {
        let asset = client
            .create_asset(&NewAsset {
                filename: product.asset_filename(),
                url: image.to_string(),
            })
            .await
            .map_err(|e| (SeedStage::CreateAsset, e))?;
        client
            .attach_assets(&created.id, &[asset.id])
            .await
            .map_err(|e| (SeedStage::AttachAsset, e))
    }
    .await;

    match attached {
        Ok(()) => Ok(created.id),
        Err((stage, e)) => {
            error!(
                product = %product.name,
                product_id = %created.id,
                stage = %stage,
                error = %e,
                "Image step failed, removing product"
            );
            let orphan = match client.delete_product(&created.id).await {
                Ok(()) => None,
                Err(delete_error) => {
                    error!(
                        product_id = %created.id,
                        error = %delete_error,
                        "Could not remove half-created product"
                    );
                    Some(created.id)
                }
            };
            Err(failure(stage, &e, orphan))
        }
    }
}

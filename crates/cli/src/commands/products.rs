//! Catalog product commands.

use tracing::info;

use vitrine_core::ProductId;

use super::commerce_client;

/// List catalog products.
///
/// # Errors
///
/// Returns an error if configuration is missing or the API request fails.
pub async fn list(limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let client = commerce_client()?;
    let products = client.list_products(limit).await?;

    info!("Products ({})", products.len());
    info!("========");
    for product in &products {
        let stock = if product.inventory.managed {
            product.inventory.available.to_string()
        } else {
            "untracked".to_string()
        };
        info!(
            "  {}  {}  {}  stock: {}",
            product.id,
            product.name,
            product.price.display(),
            stock
        );
    }

    Ok(())
}

/// Delete a product.
///
/// # Errors
///
/// Returns an error if configuration is missing, no secret key is set, or
/// the API request fails.
pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = commerce_client()?;
    let id = ProductId::new(id);

    client.delete_product(&id).await?;
    info!("Deleted product {id}");

    Ok(())
}

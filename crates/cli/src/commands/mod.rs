//! CLI command implementations.

pub mod products;
pub mod seed;

use vitrine_storefront::commerce::CommerceClient;
use vitrine_storefront::config::CommerceConfig;

/// Build a commerce client from the environment.
fn commerce_client() -> Result<CommerceClient, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = CommerceConfig::from_env()?;
    Ok(CommerceClient::new(&config))
}

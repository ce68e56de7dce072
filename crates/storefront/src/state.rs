//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::{self, CatalogStatus};
use crate::commerce::CommerceClient;
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// configuration and the commerce API client. Per-visitor state (cart ID,
/// last order) lives in the session, not here.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    commerce: CommerceClient,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let commerce = CommerceClient::new(&config.commerce);

        Self {
            inner: Arc::new(AppStateInner { config, commerce }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the commerce API client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// Check the catalog in the background, seeding it when empty.
    ///
    /// Returns immediately; failures are logged and never stop the server.
    pub fn start_catalog_bootstrap(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            match catalog::ensure_catalog(state.commerce(), &state.config().catalog).await {
                Ok(CatalogStatus::Ready(count)) => {
                    tracing::info!(count, "Catalog ready");
                }
                Ok(CatalogStatus::Seeded(report)) => {
                    tracing::info!(
                        created = report.created.len(),
                        failed = report.failures.len(),
                        "Catalog seeded"
                    );
                    for failure in &report.failures {
                        tracing::warn!(
                            product = %failure.name,
                            stage = %failure.stage,
                            error = %failure.error,
                            "Product not seeded"
                        );
                    }
                }
                Ok(CatalogStatus::Empty) => {
                    tracing::warn!("Catalog is empty");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Catalog bootstrap failed");
                }
            }
        })
    }
}

//! Commerce API client implementation.
//!
//! Uses `reqwest` for HTTP with JSON bodies. Caches catalog reads using
//! `moka` (5-minute TTL). Cart and checkout calls are never cached: the
//! remote cart is the only copy and every response replaces the last one.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use vitrine_core::{AssetId, CartId, CheckoutTokenId, LineItemId, ProductId};

use super::cache::{CacheKey, CacheValue};
use super::types::{
    AddToCartBody, Asset, AssetRef, AttachAssetsBody, CaptureRequest, Cart, CartMutation,
    CheckoutToken, CountriesResponse, NewAsset, NewProduct, NewProductBody, Order, Product,
    ProductList, ShippingOption, SubdivisionsResponse, UpdateQuantityBody,
};
use super::{ApiError, CommerceError};
use crate::config::CommerceConfig;

/// Header carrying the API key.
const AUTH_HEADER: &str = "X-Authorization";

/// Which key a request is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Public,
    Secret,
}

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the commerce REST API.
///
/// Cheap to clone; all clones share one connection pool and cache.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: String,
    public_key: String,
    secret_key: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce API client.
    #[must_use]
    pub fn new(config: &CommerceConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CommerceClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.trim_end_matches('/').to_string(),
                public_key: config.public_key.clone(),
                secret_key: config.secret_key.clone(),
                cache,
            }),
        }
    }

    /// Whether catalog writes are possible.
    #[must_use]
    pub fn has_secret_key(&self) -> bool {
        self.inner.secret_key.is_some()
    }

    /// Start a request signed with the given key.
    fn request(&self, method: Method, path: &str, key: Key) -> Result<RequestBuilder, CommerceError> {
        let token = match key {
            Key::Public => self.inner.public_key.as_str(),
            Key::Secret => self
                .inner
                .secret_key
                .as_ref()
                .ok_or(CommerceError::MissingSecretKey)?
                .expose_secret(),
        };

        Ok(self
            .inner
            .client
            .request(method, format!("{}{path}", self.inner.base_url))
            .header(AUTH_HEADER, token)
            .header(ACCEPT, "application/json"))
    }

    /// Send a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CommerceError> {
        let response = request.send().await?;
        let status = response.status();
        let path = response.url().path().to_string();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CommerceError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            debug!(path = %path, "Commerce API returned 404");
            return Err(CommerceError::NotFound(path));
        }

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                path = %path,
                body = %response_text.chars().take(500).collect::<String>(),
                "Commerce API returned non-success status"
            );
            return Err(CommerceError::Api {
                status: status.as_u16(),
                error: ApiError::from_body(&response_text),
            });
        }

        let body = if response_text.trim().is_empty() {
            "null"
        } else {
            response_text.as_str()
        };

        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse commerce API response"
            );
            CommerceError::Parse(e)
        })
    }

    /// Drop every cached catalog read.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Check that the API is reachable with the configured public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn ping(&self) -> Result<(), CommerceError> {
        let request = self
            .request(Method::GET, "/products", Key::Public)?
            .query(&[("limit", 1)]);
        self.execute::<ProductList>(request).await.map(|_| ())
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List up to `limit` products.
    ///
    /// An empty catalog yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        let cache_key = CacheKey::Products { limit };

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let request = self
            .request(Method::GET, "/products", Key::Public)?
            .query(&[("limit", limit)]);
        let products = self.execute::<ProductList>(request).await?.into_products();

        // An empty catalog is about to be seeded, don't pin it in the cache
        if !products.is_empty() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CommerceError> {
        let cache_key = CacheKey::Product(id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let request = self.request(Method::GET, &format!("/products/{id}"), Key::Public)?;
        let product: Product = self.execute(request).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret key is configured or the API request fails.
    #[instrument(skip(self), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, CommerceError> {
        let request = self
            .request(Method::POST, "/products", Key::Secret)?
            .json(&NewProductBody { product });
        self.execute(request).await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret key is configured or the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), CommerceError> {
        let request = self.request(Method::DELETE, &format!("/products/{id}"), Key::Secret)?;
        self.execute::<serde_json::Value>(request).await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Register a remote image as an asset.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret key is configured or the API request fails.
    #[instrument(skip(self), fields(filename = %asset.filename))]
    pub async fn create_asset(&self, asset: &NewAsset) -> Result<Asset, CommerceError> {
        let request = self
            .request(Method::POST, "/assets", Key::Secret)?
            .json(asset);
        self.execute(request).await
    }

    /// Associate assets with a product.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret key is configured or the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn attach_assets(
        &self,
        product_id: &ProductId,
        assets: &[AssetId],
    ) -> Result<(), CommerceError> {
        let body = AttachAssetsBody {
            assets: assets.iter().map(|id| AssetRef { id }).collect(),
        };
        let request = self
            .request(
                Method::POST,
                &format!("/products/{product_id}/assets"),
                Key::Secret,
            )?
            .json(&body);
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Create a new, empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<Cart, CommerceError> {
        let request = self.request(Method::GET, "/carts", Key::Public)?;
        self.execute(request).await
    }

    /// Replace the current cart with a fresh one (after checkout).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn refresh_cart(&self) -> Result<Cart, CommerceError> {
        self.create_cart().await
    }

    /// Retrieve a cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the cart expired, or an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        let request = self.request(Method::GET, &format!("/carts/{cart_id}"), Key::Public)?;
        self.execute(request).await
    }

    /// Add `quantity` units of a product to a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, CommerceError> {
        let request = self
            .request(Method::POST, &format!("/carts/{cart_id}"), Key::Public)?
            .json(&AddToCartBody {
                id: product_id,
                quantity,
            });
        Ok(self.execute::<CartMutation>(request).await?.cart)
    }

    /// Set the quantity of a line item. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    pub async fn update_cart_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, CommerceError> {
        let request = self
            .request(
                Method::PUT,
                &format!("/carts/{cart_id}/items/{line_item_id}"),
                Key::Public,
            )?
            .json(&UpdateQuantityBody { quantity });
        Ok(self.execute::<CartMutation>(request).await?.cart)
    }

    /// Remove a line item from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    pub async fn remove_from_cart(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
    ) -> Result<Cart, CommerceError> {
        let request = self.request(
            Method::DELETE,
            &format!("/carts/{cart_id}/items/{line_item_id}"),
            Key::Public,
        )?;
        Ok(self.execute::<CartMutation>(request).await?.cart)
    }

    /// Remove every line item from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn empty_cart(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        let request = self.request(
            Method::DELETE,
            &format!("/carts/{cart_id}/items"),
            Key::Public,
        )?;
        Ok(self.execute::<CartMutation>(request).await?.cart)
    }

    // =========================================================================
    // Checkout Methods
    // =========================================================================

    /// Generate a checkout token for a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is empty or the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn generate_checkout_token(
        &self,
        cart_id: &CartId,
    ) -> Result<CheckoutToken, CommerceError> {
        let request = self
            .request(Method::GET, &format!("/checkouts/{cart_id}"), Key::Public)?
            .query(&[("type", "cart")]);
        self.execute(request).await
    }

    /// Countries the merchant ships to, as `code -> name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(token = %token_id))]
    pub async fn shipping_countries(
        &self,
        token_id: &CheckoutTokenId,
    ) -> Result<Vec<(String, String)>, CommerceError> {
        let request = self.request(
            Method::GET,
            &format!("/services/locale/{token_id}/countries"),
            Key::Public,
        )?;
        let response: CountriesResponse = self.execute(request).await?;
        Ok(response.countries.into_iter().collect())
    }

    /// Subdivisions (states, provinces) of a country, as `code -> name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn shipping_subdivisions(
        &self,
        country: &str,
    ) -> Result<Vec<(String, String)>, CommerceError> {
        let request = self.request(
            Method::GET,
            &format!("/services/locale/{country}/subdivisions"),
            Key::Public,
        )?;
        let response: SubdivisionsResponse = self.execute(request).await?;
        Ok(response.subdivisions.into_iter().collect())
    }

    /// Shipping options available for a destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(token = %token_id))]
    pub async fn shipping_options(
        &self,
        token_id: &CheckoutTokenId,
        country: &str,
        region: Option<&str>,
    ) -> Result<Vec<ShippingOption>, CommerceError> {
        let mut query = vec![("country", country)];
        if let Some(region) = region {
            query.push(("region", region));
        }

        let request = self
            .request(
                Method::GET,
                &format!("/checkouts/{token_id}/helper/shipping_options"),
                Key::Public,
            )?
            .query(&query);
        self.execute(request).await
    }

    /// Capture a checkout, turning it into an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment or validation fails or the API
    /// request fails.
    #[instrument(skip(self, capture), fields(token = %token_id))]
    pub async fn capture_checkout(
        &self,
        token_id: &CheckoutTokenId,
        capture: &CaptureRequest,
    ) -> Result<Order, CommerceError> {
        let request = self
            .request(Method::POST, &format!("/checkouts/{token_id}"), Key::Public)?
            .json(capture);
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: Option<&str>) -> CommerceConfig {
        CommerceConfig {
            api_url: "http://127.0.0.1:9/v1/".to_string(),
            public_key: "pk_test".to_string(),
            secret_key: secret.map(SecretString::from),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CommerceClient::new(&config(None));
        assert_eq!(client.inner.base_url, "http://127.0.0.1:9/v1");
    }

    #[tokio::test]
    async fn test_secret_operations_require_secret_key() {
        let client = CommerceClient::new(&config(None));
        assert!(!client.has_secret_key());

        let result = client.delete_product(&ProductId::new("prod_1")).await;
        assert!(matches!(result, Err(CommerceError::MissingSecretKey)));
    }

    #[test]
    fn test_request_signs_with_selected_key() {
        let client = CommerceClient::new(&config(Some("sk_test_9dK2")));

        let public = client
            .request(Method::GET, "/carts", Key::Public)
            .and_then(|r| r.build().map_err(CommerceError::from));
        let secret = client
            .request(Method::POST, "/products", Key::Secret)
            .and_then(|r| r.build().map_err(CommerceError::from));

        let (Ok(public), Ok(secret)) = (public, secret) else {
            panic!("requests should build");
        };
        assert_eq!(public.url().as_str(), "http://127.0.0.1:9/v1/carts");
        assert_eq!(public.headers()[AUTH_HEADER], "pk_test");
        assert_eq!(secret.headers()[AUTH_HEADER], "sk_test_9dK2");
    }
}

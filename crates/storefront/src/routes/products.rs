//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::commerce::Product;
use crate::filters;
use crate::state::AppState;

/// Product card display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub available: u32,
    pub in_stock: bool,
    pub image_url: Option<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display(),
            available: product.inventory.available,
            in_stock: product.inventory.in_stock(),
            image_url: product.media.source.clone(),
        }
    }
}

/// Product grid page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductView>,
}

/// Display the product grid.
///
/// A failed catalog fetch renders an empty grid.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let limit = state.config().catalog.list_limit;
    let products = match state.commerce().list_products(limit).await {
        Ok(products) => products.iter().map(ProductView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch products");
            Vec::new()
        }
    };

    ProductsIndexTemplate { products }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use vitrine_core::{Inventory, Price, ProductId};

    use super::*;
    use crate::commerce::Media;

    fn product(available: u32, image: Option<&str>) -> Product {
        Product {
            id: ProductId::new("prod_1"),
            name: "Rustic Metal Fish".to_string(),
            price: Price::from_raw(Decimal::new(65900, 2), "R$", "BRL"),
            inventory: Inventory::managed(available),
            media: Media {
                kind: image.map(|_| "image".to_string()),
                source: image.map(str::to_owned),
            },
            description: None,
            permalink: None,
        }
    }

    #[test]
    fn test_product_view_from_product() {
        let view = ProductView::from(&product(3, Some("https://img.example/fish.png")));
        assert_eq!(view.id, "prod_1");
        assert_eq!(view.price, "R$659.00");
        assert_eq!(view.available, 3);
        assert!(view.in_stock);
        assert_eq!(view.image_url.as_deref(), Some("https://img.example/fish.png"));
    }

    #[test]
    fn test_sold_out_product() {
        let view = ProductView::from(&product(0, None));
        assert!(!view.in_stock);
        assert!(view.image_url.is_none());
    }

    #[test]
    fn test_index_template_renders_cards() {
        let html = ProductsIndexTemplate {
            products: vec![ProductView::from(&product(2, None))],
        }
        .render()
        .unwrap();
        assert!(html.contains("Rustic Metal Fish"));
        assert!(html.contains("2 in stock"));
    }
}

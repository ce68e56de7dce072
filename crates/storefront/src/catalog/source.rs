//! Seed sources and seed rows.

use std::fmt;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use vitrine_core::types::inventory::deserialize_stock;

use super::CatalogError;

/// Where seed products come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// An HTTP endpoint returning a JSON array.
    Remote(String),
    /// A local YAML or JSON file holding a list.
    File(PathBuf),
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl SeedSource {
    /// Load the raw rows of the source.
    ///
    /// Rows are returned undecoded so one malformed product does not reject
    /// the whole list.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be fetched or read, or is not a
    /// list.
    pub async fn load(&self) -> Result<Vec<Value>, CatalogError> {
        match self {
            Self::Remote(url) => {
                let rows = reqwest::Client::new()
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Vec<Value>>()
                    .await?;
                Ok(rows)
            }
            Self::File(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                Ok(serde_yaml::from_str::<Vec<Value>>(&content)?)
            }
        }
    }
}

/// A product as listed by the seed source.
///
/// ```json
/// {"id": "1", "name": "Rustic Metal Fish", "price": "659.00", "stock": 98548, "image": "http://lorempixel.com/640/480/food"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedProduct {
    /// Identifier in the seed source, used as the asset file name.
    #[serde(default, deserialize_with = "deserialize_source_id")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Units in stock.
    #[serde(deserialize_with = "deserialize_stock")]
    pub stock: u32,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
}

impl SeedProduct {
    /// Decode one seed row.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or malformed.
    pub fn from_value(row: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(row)
    }

    /// File name for the product image asset.
    ///
    /// The source ID when present, the product name otherwise.
    #[must_use]
    pub fn asset_filename(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.name.clone())
    }
}

/// Accept a source ID given as a string or a number.
fn deserialize_source_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|id| match id {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_mock_row_with_string_fields() {
        let row = json!({
            "id": "1",
            "createdAt": "2019-09-02T14:31:31.233Z",
            "name": "Rustic Metal Fish",
            "price": "659.00",
            "image": "http://lorempixel.com/640/480/food",
            "stock": "98548"
        });
        let product = SeedProduct::from_value(row).unwrap();
        assert_eq!(product.name, "Rustic Metal Fish");
        assert_eq!(product.price, Decimal::new(65900, 2));
        assert_eq!(product.stock, 98_548);
        assert_eq!(product.asset_filename(), "1");
    }

    #[test]
    fn test_numeric_id_and_stock() {
        let row = json!({"id": 7, "name": "Caneca", "price": 25.9, "stock": 3});
        let product = SeedProduct::from_value(row).unwrap();
        assert_eq!(product.id.as_deref(), Some("7"));
        assert_eq!(product.stock, 3);
        assert!(product.image.is_none());
    }

    #[test]
    fn test_missing_id_falls_back_to_name() {
        let row = json!({"name": "Mesa", "price": "100", "stock": 1});
        let product = SeedProduct::from_value(row).unwrap();
        assert_eq!(product.asset_filename(), "Mesa");
    }

    #[test]
    fn test_bad_stock_is_rejected() {
        let row = json!({"name": "Mesa", "price": "100", "stock": "lots"});
        assert!(SeedProduct::from_value(row).is_err());
    }

    #[tokio::test]
    async fn test_load_yaml_file() {
        let path = std::env::temp_dir().join(format!("vitrine-seed-{}.yaml", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            "- name: Caneca\n  price: \"25.90\"\n  stock: 4\n  image: https://img.example/caneca.png\n",
        )
        .await
        .unwrap();

        let rows = SeedSource::File(path.clone()).load().await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(rows.len(), 1);
        let product = SeedProduct::from_value(rows.into_iter().next().unwrap()).unwrap();
        assert_eq!(product.name, "Caneca");
        assert_eq!(product.stock, 4);
    }

    #[tokio::test]
    async fn test_load_rejects_non_list_file() {
        let path = std::env::temp_dir().join(format!("vitrine-seed-{}.yaml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "name: not-a-list\n").await.unwrap();

        let result = SeedSource::File(path.clone()).load().await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(matches!(result, Err(CatalogError::Yaml(_))));
    }
}

//! Inventory counts and stock parsing.

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a stock count.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// The input has no leading digits.
    #[error("stock is not a number: {0:?}")]
    NotANumber(String),
    /// The input is negative.
    #[error("stock cannot be negative: {0:?}")]
    Negative(String),
    /// The input does not fit in a `u32`.
    #[error("stock is too large: {0:?}")]
    TooLarge(String),
}

/// Inventory tracking for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Whether the commerce service tracks stock for this product.
    #[serde(default)]
    pub managed: bool,
    /// Units available for sale.
    #[serde(default)]
    pub available: u32,
}

impl Inventory {
    /// A managed inventory with `available` units.
    #[must_use]
    pub const fn managed(available: u32) -> Self {
        Self {
            managed: true,
            available,
        }
    }

    /// Whether at least one unit can be sold.
    ///
    /// Unmanaged inventory is always in stock.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        !self.managed || self.available > 0
    }
}

/// Parse a stock count the way a base-10 `parseInt` reads it.
///
/// Leading whitespace and a `+` sign are skipped, then the longest run of
/// ASCII digits is used and anything after it is ignored.
///
/// # Errors
///
/// Returns an error if there are no leading digits, the value is negative,
/// or it does not fit in a `u32`.
///
/// # Examples
///
/// ```
/// use vitrine_core::parse_stock;
///
/// assert_eq!(parse_stock("98548"), Ok(98548));
/// assert_eq!(parse_stock("  12 units"), Ok(12));
/// assert!(parse_stock("many").is_err());
/// ```
pub fn parse_stock(input: &str) -> Result<u32, StockError> {
    let trimmed = input.trim_start();

    if let Some(rest) = trimmed.strip_prefix('-') {
        return if rest.starts_with(|c: char| c.is_ascii_digit()) {
            Err(StockError::Negative(input.to_owned()))
        } else {
            Err(StockError::NotANumber(input.to_owned()))
        };
    }

    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits_len = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let digits = unsigned.get(..digits_len).unwrap_or_default();

    if digits.is_empty() {
        return Err(StockError::NotANumber(input.to_owned()));
    }

    digits
        .parse::<u32>()
        .map_err(|_| StockError::TooLarge(input.to_owned()))
}

/// Deserialize a stock count given either as a JSON number or a string.
///
/// Fractional numbers are truncated.
///
/// # Errors
///
/// Returns a deserialization error if the value is neither a number nor a
/// string, or if [`parse_stock`] rejects it.
pub fn deserialize_stock<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawStock {
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    let text = match RawStock::deserialize(deserializer)? {
        RawStock::Unsigned(n) => n.to_string(),
        RawStock::Signed(n) => n.to_string(),
        RawStock::Float(n) => format!("{}", n.trunc()),
        RawStock::Text(s) => s,
    };

    parse_stock(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_stock("98548"), Ok(98_548));
        assert_eq!(parse_stock("0"), Ok(0));
    }

    #[test]
    fn test_parse_ignores_trailing_text() {
        assert_eq!(parse_stock("12abc"), Ok(12));
        assert_eq!(parse_stock("7.9"), Ok(7));
        assert_eq!(parse_stock("  +42"), Ok(42));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(matches!(parse_stock(""), Err(StockError::NotANumber(_))));
        assert!(matches!(parse_stock("abc"), Err(StockError::NotANumber(_))));
        assert!(matches!(parse_stock("-"), Err(StockError::NotANumber(_))));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert!(matches!(parse_stock("-3"), Err(StockError::Negative(_))));
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(matches!(
            parse_stock("99999999999"),
            Err(StockError::TooLarge(_))
        ));
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "deserialize_stock")]
        stock: u32,
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let row: Row = serde_json::from_str(r#"{"stock": 15}"#).unwrap();
        assert_eq!(row.stock, 15);

        let row: Row = serde_json::from_str(r#"{"stock": "15"}"#).unwrap();
        assert_eq!(row.stock, 15);

        let row: Row = serde_json::from_str(r#"{"stock": 15.8}"#).unwrap();
        assert_eq!(row.stock, 15);

        assert!(serde_json::from_str::<Row>(r#"{"stock": -1}"#).is_err());
        assert!(serde_json::from_str::<Row>(r#"{"stock": null}"#).is_err());
    }

    #[test]
    fn test_in_stock() {
        assert!(Inventory::managed(1).in_stock());
        assert!(!Inventory::managed(0).in_stock());
        assert!(Inventory::default().in_stock());
    }
}

//! Price as reported by the commerce API.
//!
//! The API returns every monetary value as an object carrying the numeric
//! amount and three pre-formatted strings:
//!
//! ```json
//! {
//!   "raw": 1659,
//!   "formatted": "1,659.00",
//!   "formatted_with_symbol": "R$1,659.00",
//!   "formatted_with_code": "1,659.00 BRL"
//! }
//! ```
//!
//! The storefront displays these strings verbatim. [`Price::from_raw`]
//! reproduces the same formatting for values built locally.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary value with its display forms.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g. reais, not centavos).
    pub raw: Decimal,
    /// Amount with two decimals and thousands separators.
    #[serde(default)]
    pub formatted: String,
    /// `formatted` prefixed with the currency symbol.
    #[serde(default)]
    pub formatted_with_symbol: String,
    /// `formatted` suffixed with the ISO 4217 currency code.
    #[serde(default)]
    pub formatted_with_code: String,
}

impl Price {
    /// Build a price and its display forms from a raw amount.
    #[must_use]
    pub fn from_raw(raw: Decimal, symbol: &str, code: &str) -> Self {
        let formatted = format_amount(raw);
        Self {
            raw,
            formatted_with_symbol: format!("{symbol}{formatted}"),
            formatted_with_code: format!("{formatted} {code}"),
            formatted,
        }
    }

    /// The string shown to shoppers.
    ///
    /// Prefers the symbol form, then the plain form, then the raw amount.
    #[must_use]
    pub fn display(&self) -> String {
        if !self.formatted_with_symbol.is_empty() {
            self.formatted_with_symbol.clone()
        } else if !self.formatted.is_empty() {
            self.formatted.clone()
        } else {
            format_amount(self.raw)
        }
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
}

/// Format an amount with two decimals and comma thousands separators.
#[must_use]
pub fn format_amount(raw: Decimal) -> String {
    let text = format!("{:.2}", raw.round_dp(2));
    let (sign, digits) = text
        .strip_prefix('-')
        .map_or(("", text.as_str()), |rest| ("-", rest));
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_format_amount_groups_thousands() {
        assert_eq!(format_amount(Decimal::from(1659)), "1,659.00");
        assert_eq!(format_amount(Decimal::from(1_234_567)), "1,234,567.00");
        assert_eq!(format_amount(Decimal::from(999)), "999.00");
    }

    #[test]
    fn test_format_amount_rounds_to_cents() {
        assert_eq!(format_amount(Decimal::from_str("19.999").unwrap()), "20.00");
        assert_eq!(format_amount(Decimal::from_str("0.5").unwrap()), "0.50");
    }

    #[test]
    fn test_format_amount_negative() {
        assert_eq!(format_amount(Decimal::from(-2500)), "-2,500.00");
    }

    #[test]
    fn test_from_raw_display_forms() {
        let price = Price::from_raw(Decimal::from_str("659.00").unwrap(), "R$", "BRL");
        assert_eq!(price.formatted, "659.00");
        assert_eq!(price.formatted_with_symbol, "R$659.00");
        assert_eq!(price.formatted_with_code, "659.00 BRL");
        assert_eq!(price.display(), "R$659.00");
    }

    #[test]
    fn test_deserialize_numeric_raw() {
        let json = r#"{"raw": 1659, "formatted": "1,659.00", "formatted_with_symbol": "$1,659.00", "formatted_with_code": "1,659.00 USD"}"#;
        let price: Price = serde_json::from_str(json).unwrap();
        assert_eq!(price.raw, Decimal::from(1659));
        assert_eq!(price.display(), "$1,659.00");
    }

    #[test]
    fn test_display_falls_back_when_strings_missing() {
        let price: Price = serde_json::from_str(r#"{"raw": 12.5}"#).unwrap();
        assert_eq!(price.display(), "12.50");
        assert!(!price.is_zero());
    }
}

//! Decimal helpers shared by the ledger and the tax engine

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Number of decimal places in the smallest currency unit (kobo, cents)
pub const CURRENCY_SCALE: i64 = 2;

/// Zero as a `BigDecimal`
pub fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

/// Round half-up to the given scale
pub fn round_half_up(value: &BigDecimal, scale: i64) -> BigDecimal {
    value.with_scale_round(scale, RoundingMode::HalfUp)
}

/// Round half-up to the smallest currency unit
pub fn round_currency(value: &BigDecimal) -> BigDecimal {
    round_half_up(value, CURRENCY_SCALE)
}

/// Clamp a value at zero from below
pub fn non_negative(value: BigDecimal) -> BigDecimal {
    if value < zero() {
        zero()
    } else {
        value
    }
}

/// Parse a decimal from its textual form
pub fn parse_decimal(text: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(text.trim()).ok()
}

/// Convert a JSON scalar into a decimal without going through `f64`.
///
/// `serde_json::Number` keeps the literal digits for display, so `0.075` stays
/// exactly `0.075`.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<BigDecimal> {
    match value {
        serde_json::Value::Number(number) => parse_decimal(&number.to_string()),
        serde_json::Value::String(text) => parse_decimal(text),
        _ => None,
    }
}

/// Serde adapter: a required decimal given as a JSON number or string
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    decimal_from_json(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a decimal, found {value}")))
}

/// Serde adapter: an optional decimal given as a JSON number, string or null
pub fn deserialize_opt_decimal<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => decimal_from_json(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a decimal, found {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency_half_up() {
        let value = BigDecimal::from_str("10.005").unwrap();
        assert_eq!(round_currency(&value), BigDecimal::from_str("10.01").unwrap());

        let value = BigDecimal::from_str("10.004").unwrap();
        assert_eq!(round_currency(&value), BigDecimal::from_str("10.00").unwrap());
    }

    #[test]
    fn test_decimal_from_json_keeps_literal_digits() {
        let value: serde_json::Value = serde_json::from_str("0.075").unwrap();
        assert_eq!(
            decimal_from_json(&value),
            Some(BigDecimal::from_str("0.075").unwrap())
        );
        assert_eq!(
            decimal_from_json(&serde_json::json!("1500.50")),
            Some(BigDecimal::from_str("1500.50").unwrap())
        );
        assert_eq!(decimal_from_json(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(BigDecimal::from(-5)), zero());
        assert_eq!(non_negative(BigDecimal::from(5)), BigDecimal::from(5));
    }
}

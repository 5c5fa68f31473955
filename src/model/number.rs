//! Lenient parsing of numeric cells.
//!
//! Spreadsheet users type quantities and prices in many ways: `12`, `12.50`, `1,250.00` or with a
//! currency prefix such as `S/ 12.50`. These helpers accept all of those and return `None` for
//! anything else so the caller can substitute its default.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Currency markers that may precede a price.
const CURRENCY_PREFIXES: &[&str] = &["S/.", "S/", "$"];

/// Parses a decimal from a string, ignoring surrounding whitespace, a currency prefix and
/// thousands separators.
pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let without_currency = CURRENCY_PREFIXES
        .iter()
        .find_map(|prefix| unsigned.strip_prefix(prefix))
        .unwrap_or(unsigned)
        .trim_start();

    let without_commas = without_currency.replace(',', "");
    let value = Decimal::from_str(&without_commas)
        .or_else(|_| Decimal::from_scientific(&without_commas))
        .ok()?;
    Some(if negative { -value } else { value })
}

/// Parses an integer from a string. Values with a fractional part are truncated toward zero.
pub(crate) fn parse_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if let Ok(i) = i64::from_str(trimmed) {
        return Some(i);
    }
    parse_decimal(trimmed).and_then(|d| d.trunc().to_i64())
}

/// Converts a float cell value to a `Decimal`. NaN and infinities have no decimal representation.
pub(crate) fn decimal_from_f64(f: f64) -> Option<Decimal> {
    Decimal::from_f64(f)
}

/// Converts a float cell value to an integer, truncating toward zero.
pub(crate) fn integer_from_f64(f: f64) -> Option<i64> {
    if f.is_finite() {
        f.trunc().to_i64()
    } else {
        None
    }
}

/// Formats a price the way the warehouse staff read it, e.g. `S/ 1,250.00`.
pub fn format_price(value: Decimal) -> String {
    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    format!(
        "{sign}S/ {}",
        format_num::format_num!(",.2", value.abs().to_f64().unwrap_or_default())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        assert_eq!(parse_decimal("12.50"), Some(dec("12.50")));
        assert_eq!(parse_decimal("  7 "), Some(dec("7")));
    }

    #[test]
    fn test_parse_with_commas() {
        assert_eq!(parse_decimal("1,234,567.89"), Some(dec("1234567.89")));
    }

    #[test]
    fn test_parse_with_currency() {
        assert_eq!(parse_decimal("S/ 12.50"), Some(dec("12.50")));
        assert_eq!(parse_decimal("S/.3"), Some(dec("3")));
        assert_eq!(parse_decimal("$1,000.00"), Some(dec("1000.00")));
        assert_eq!(parse_decimal("-$5"), Some(dec("-5")));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("12kg"), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer(" 7.9 "), Some(7));
        assert_eq!(parse_integer("1,024"), Some(1024));
        assert_eq!(parse_integer("x"), None);
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(integer_from_f64(3.0), Some(3));
        assert_eq!(integer_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(2.5), Some(dec("2.5")));
        assert_eq!(decimal_from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(dec("1250")), "S/ 1,250.00");
        assert_eq!(format_price(dec("0.5")), "S/ 0.50");
    }
}

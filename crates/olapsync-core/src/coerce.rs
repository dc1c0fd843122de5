//! Null-safe coercion of loosely typed source values.
//!
//! Upstream payloads are not contractually typed: the same measure may arrive
//! as a JSON number, a numeric string, a localized string (`"1 234,50"`), an
//! empty string, or `null`. Every helper here is total: data-quality problems
//! become zero / `None`, never an error.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

/// Coerces any JSON value into a decimal, defaulting to zero.
#[must_use]
pub fn decimal_or_zero(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()).unwrap_or(Decimal::ZERO),
        Value::String(s) => parse_decimal(s).unwrap_or(Decimal::ZERO),
        Value::Bool(true) => Decimal::ONE,
        _ => Decimal::ZERO,
    }
}

/// Parses a numeric string, tolerating thousands separators (ASCII space,
/// NBSP, narrow NBSP), a decimal comma, and scientific notation.
#[must_use]
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Renders a scalar JSON value as text. Blank strings and non-scalars are `None`.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extracts the leading run of ASCII digits from an hour bucket such as
/// `7`, `"7"`, or `"10-11 час"`. Returns 0 when there are none.
#[must_use]
pub fn leading_hour(value: &Value) -> u32 {
    let text = scalar_text(value).unwrap_or_default();
    let digits: String = text
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Parses a calendar day from the first ten characters of a date or
/// timestamp string. Accepts ISO (`2025-06-01T00:00:00`) and the dotted
/// Russian form (`01.06.2025`).
#[must_use]
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let head: String = raw.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&head, "%d.%m.%Y"))
        .ok()
}

//! Locale-aware number parsing
//!
//! Listing values arrive as display strings such as `"۱۲۰ متر"` or
//! `"۴٬۵۰۰٬۰۰۰٬۰۰۰ تومان"`. Parsing never fails loudly: anything that does not
//! reduce to a finite number becomes `None`.

use crate::model::Number;
use serde_json::Value;

/// Unit words removed before parsing; longer tokens first so that
/// `مترمربع` is not left half-stripped by `متر`
const UNIT_TOKENS: &[&str] = &["مترمربع", "متر", "تومان", "ریال", "m²", "m2"];

const THOUSANDS_SEPARATORS: &[char] = &[',', '\u{066C}', '\''];

/// Arabic decimal separator
const DECIMAL_SEPARATOR: char = '\u{066B}';

/// Parses a locale-formatted numeric string
///
/// # Example
///
/// ```
/// use listing_harvest::normalize::parse_number;
/// use listing_harvest::Number;
///
/// assert_eq!(parse_number("۱٬۲۳۴ تومان"), Some(Number::Int(1234)));
/// assert_eq!(parse_number("12.5"), Some(Number::Float(12.5)));
/// assert_eq!(parse_number("-"), None);
/// ```
pub fn parse_number(input: &str) -> Option<Number> {
    let mut text = input.to_string();
    for unit in UNIT_TOKENS {
        text = text.replace(unit, "");
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !THOUSANDS_SEPARATORS.contains(c))
        .map(to_ascii_digit)
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }

    match cleaned.parse::<f64>() {
        Ok(value) => Number::from_f64(value),
        Err(e) => {
            tracing::trace!("Could not parse '{}' (cleaned '{}'): {}", input, cleaned, e);
            None
        }
    }
}

/// Coerces an arbitrary JSON value
///
/// Numbers pass through, strings go through [`parse_number`], everything else
/// (null, booleans, arrays, objects) is `None`.
pub fn parse_json_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Number::Int(i))
            } else {
                n.as_f64().and_then(Number::from_f64)
            }
        }
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Maps Persian and Arabic-Indic digits (and the Arabic decimal mark) to ASCII
fn to_ascii_digit(c: char) -> char {
    match c {
        '\u{06F0}'..='\u{06F9}' => shift_digit(c, 0x06F0),
        '\u{0660}'..='\u{0669}' => shift_digit(c, 0x0660),
        DECIMAL_SEPARATOR => '.',
        _ => c,
    }
}

fn shift_digit(c: char, zero: u32) -> char {
    char::from_digit(c as u32 - zero, 10).unwrap_or(c)
}

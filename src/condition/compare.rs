//! Value comparison semantics
//!
//! Every operator is total over the JSON value union. Cross-type pairs have
//! an explicit result instead of an implicit coercion:
//!
//! | left \ right   | loose `=`                                   | ordering            |
//! |----------------|---------------------------------------------|---------------------|
//! | number/number  | numeric                                     | numeric             |
//! | number/string  | numeric if the string is numeric, else false| same, else no order |
//! | string/string  | numeric if both numeric, else exact         | numeric or lexical  |
//! | bool/any       | bool == truthiness(any)                     | bool/bool only      |
//! | null/any       | any is null, false, 0, "", [] or {}         | never ordered       |
//! | array/array    | element-wise loose                          | never ordered       |
//!
//! Pairs without an order never satisfy `<`, `<=`, `>` or `>=`.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::{Regex, RegexBuilder};
use serde_json::{Number, Value};

use crate::errors::{StoreError, StoreResult};

/// Strict equality: same JSON type and same value.
///
/// Integers and floats are different types here, so `1 === 1.0` is false.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    a == b
}

/// Equality with type coercion
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => is_empty_value(other),
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == truthy(other),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Number(x), Value::String(s)) | (Value::String(s), Value::Number(x)) => {
            match (x.as_f64(), parse_numeric(s)) {
                (Some(n), Some(m)) => n == m,
                _ => false,
            }
        }
        (Value::String(x), Value::String(y)) => match (parse_numeric(x), parse_numeric(y)) {
            (Some(n), Some(m)) => n == m,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loose_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|w| loose_eq(v, w)).unwrap_or(false))
        }
        _ => false,
    }
}

/// Natural ordering where one exists
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => match (parse_numeric(x), parse_numeric(y)) {
            (Some(n), Some(m)) => n.partial_cmp(&m),
            _ => Some(x.cmp(y)),
        },
        (Value::Number(x), Value::String(s)) => x.as_f64()?.partial_cmp(&parse_numeric(s)?),
        (Value::String(s), Value::Number(y)) => parse_numeric(s)?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Compares two JSON numbers without losing integer precision
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Parses a finite number from a string
pub fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric view of a value; numeric strings count as numbers
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

/// Truthiness used when a boolean is compared loosely
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Text view used by `like` and search: strings as-is, numbers and
/// booleans rendered, everything else has no text.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Translates a SQL `like` pattern into an anchored, case-insensitive regex.
///
/// `%` matches any run of characters and `_` exactly one. The characters
/// `[`, `]`, `^` and `-` pass through so bracket classes keep working; all
/// other metacharacters are escaped.
pub fn like_pattern(pattern: &str) -> StoreResult<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            '[' | ']' | '^' | '-' => translated.push(c),
            other => translated.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    translated.push('$');

    RegexBuilder::new(&translated)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| {
            StoreError::invalid_argument(format!("Invalid like pattern \"{}\"", pattern))
                .with_details(e.to_string())
        })
}

/// Parses a textual timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`; naive forms are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive).into());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).into())
}

/// Coerces a field value to a timestamp for comparison against a temporal
/// operand. Absent, null and empty values never coerce, so they can not
/// drift to "now". Numbers are Unix seconds.
pub fn to_timestamp(value: Option<&Value>) -> Option<DateTime<FixedOffset>> {
    match value? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            let seconds = n.as_f64()?;
            let whole = seconds.trunc() as i64;
            let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
            Utc.timestamp_opt(whole, nanos).single().map(Into::into)
        }
        _ => None,
    }
}

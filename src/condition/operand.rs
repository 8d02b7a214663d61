//! Right-hand side of a condition
//!
//! Plain JSON values cover most comparisons. A temporal operand is kept as
//! its own variant so the evaluator can coerce the field value to a
//! timestamp instead of comparing strings. In JSON, a temporal operand is
//! written as `{"$date": "2021-03-01T10:00:00Z"}`.

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{json, Map, Value};

use super::compare::parse_timestamp;
use crate::errors::{StoreError, StoreResult};

/// JSON key marking a temporal operand
pub const DATE_KEY: &str = "$date";

/// Condition operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Any JSON value
    Value(Value),
    /// An explicit point in time
    DateTime(DateTime<FixedOffset>),
    /// An array holding at least one temporal element
    List(Vec<Operand>),
}

impl Operand {
    /// Builds a list operand, collapsing to a plain JSON array when no
    /// element is temporal
    pub fn list(items: impl IntoIterator<Item = Operand>) -> Self {
        let items: Vec<Operand> = items.into_iter().collect();
        if items.iter().any(|item| !matches!(item, Operand::Value(_))) {
            return Operand::List(items);
        }
        Operand::Value(Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Operand::Value(v) => v,
                    other => other.to_json(),
                })
                .collect(),
        ))
    }

    /// Decodes an operand, recognising `{"$date": ...}` markers
    pub fn from_json(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) if map.len() == 1 && map.contains_key(DATE_KEY) => {
                let raw = &map[DATE_KEY];
                let text = raw.as_str().ok_or_else(|| {
                    StoreError::invalid_argument(format!(
                        "\"{}\" must hold a date string, got {}",
                        DATE_KEY, raw
                    ))
                })?;
                parse_timestamp(text)
                    .map(Operand::DateTime)
                    .ok_or_else(|| {
                        StoreError::invalid_argument(format!("Unparseable date \"{}\"", text))
                    })
            }
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(Operand::from_json)
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(Operand::list(items))
            }
            other => Ok(Operand::Value(other)),
        }
    }

    /// Encodes the operand; inverse of [`Operand::from_json`]
    pub fn to_json(&self) -> Value {
        match self {
            Operand::Value(v) => v.clone(),
            Operand::DateTime(t) => {
                let mut map = Map::new();
                map.insert(DATE_KEY.to_string(), json!(t.to_rfc3339()));
                Value::Object(map)
            }
            Operand::List(items) => Value::Array(items.iter().map(Operand::to_json).collect()),
        }
    }

    /// Returns the elements when the operand is an array of any kind
    pub fn elements(&self) -> Option<Vec<Operand>> {
        match self {
            Operand::Value(Value::Array(items)) => {
                Some(items.iter().cloned().map(Operand::Value).collect())
            }
            Operand::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Returns the timestamp of a temporal operand
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Operand::DateTime(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the JSON value of a non-temporal operand
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<DateTime<FixedOffset>> for Operand {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Operand::DateTime(t)
    }
}

impl From<DateTime<Utc>> for Operand {
    fn from(t: DateTime<Utc>) -> Self {
        Operand::DateTime(t.into())
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Value(Value::from(s))
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Value(Value::from(s))
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Value(Value::from(n))
    }
}

impl From<u64> for Operand {
    fn from(n: u64) -> Self {
        Operand::Value(Value::from(n))
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Value(Value::from(n))
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Value(Value::from(n))
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Value(Value::Bool(b))
    }
}

impl From<Vec<Operand>> for Operand {
    fn from(items: Vec<Operand>) -> Self {
        Operand::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_marker_decodes_to_temporal() {
        let op = Operand::from_json(json!({"$date": "2021-03-01T10:00:00Z"})).unwrap();
        let expected = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(op.as_datetime().unwrap(), &DateTime::<FixedOffset>::from(expected));
    }

    #[test]
    fn test_plain_array_stays_json() {
        let op = Operand::from_json(json!([1, 2, 3])).unwrap();
        assert_eq!(op, Operand::Value(json!([1, 2, 3])));
    }

    #[test]
    fn test_array_with_date_becomes_list() {
        let op = Operand::from_json(json!([{"$date": "2021-01-01"}, 5])).unwrap();
        assert!(matches!(op, Operand::List(ref items) if items.len() == 2));
        assert_eq!(op.elements().unwrap().len(), 2);
    }

    #[test]
    fn test_bad_date_marker_rejected() {
        assert!(Operand::from_json(json!({"$date": "yesterday"})).is_err());
        assert!(Operand::from_json(json!({"$date": 5})).is_err());
    }

    #[test]
    fn test_to_json_roundtrips_temporal() {
        let op = Operand::from(Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap());
        let back = Operand::from_json(op.to_json()).unwrap();
        assert_eq!(back, op);
    }
}

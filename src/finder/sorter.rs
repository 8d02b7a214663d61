//! Result sorting
//!
//! Multi-key, stable. Each key has its own direction; later keys only break
//! ties left by earlier ones.

use std::cmp::Ordering;

use serde_json::{json, Value};

use crate::condition::compare::compare_numbers;
use crate::document::{Document, NestedPath};
use crate::errors::{StoreError, StoreResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses `asc` / `desc`, ignoring case
    pub fn parse(s: &str) -> StoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(StoreError::configuration(format!(
                "Invalid order direction \"{}\", expected \"asc\" or \"desc\"",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Dot path of the field to sort by
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Builds a key from a direction string
    pub fn parse(field: impl Into<String>, direction: &str) -> StoreResult<Self> {
        Ok(Self {
            field: field.into(),
            direction: SortDirection::parse(direction)?,
        })
    }

    pub fn to_json(&self) -> Value {
        json!([self.field, self.direction.as_str()])
    }
}

/// Sorts documents in place
pub struct DocumentSorter;

impl DocumentSorter {
    /// Sorts by the given keys. A missing field sorts like `null`.
    pub fn sort(documents: &mut [Document], order: &[OrderBy]) -> StoreResult<()> {
        if order.is_empty() || documents.len() < 2 {
            return Ok(());
        }

        let keys = order
            .iter()
            .map(|o| -> StoreResult<(NestedPath, SortDirection)> {
                Ok((NestedPath::parse(&o.field)?, o.direction))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        documents.sort_by(|a, b| {
            for (path, direction) in &keys {
                let ordering = Self::compare_values(path.get(a), path.get(b));
                let ordering = match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    /// Total order over JSON values for sorting.
    ///
    /// - absent = null < bool < number < string < array < object
    /// - Same types use natural ordering; arrays and objects compare equal
    fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.unwrap_or(&Value::Null);
        let b = b.unwrap_or(&Value::Null);

        let type_order = |v: &Value| -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            }
        };

        let (a_type, b_type) = (type_order(a), type_order(b));
        if a_type != b_type {
            return a_type.cmp(&b_type);
        }

        match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                compare_numbers(x, y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }
}

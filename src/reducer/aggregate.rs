//! Select functions and aggregate accumulators
//!
//! Reducing functions (`sum`, `min`, `max`, `avg`) fold a set of rows into
//! one value. The others transform a single value.
//!
//! Aggregates skip values that are not numeric. `avg` still divides by the
//! number of rows in the bucket, skipped ones included.

use std::fmt;

use serde_json::{Number, Value};

use crate::condition::compare::as_number;
use crate::document::{Document, NestedPath};
use crate::errors::{StoreError, StoreResult};

/// Function usable in a select list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectFunction {
    Sum,
    Min,
    Max,
    Avg,
    Length,
    Upper,
    Lower,
    Abs,
    Round,
    Trim,
}

impl SelectFunction {
    /// Parses a function name, ignoring case
    pub fn parse(s: &str) -> StoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(SelectFunction::Sum),
            "min" => Ok(SelectFunction::Min),
            "max" => Ok(SelectFunction::Max),
            "avg" => Ok(SelectFunction::Avg),
            "length" => Ok(SelectFunction::Length),
            "upper" => Ok(SelectFunction::Upper),
            "lower" => Ok(SelectFunction::Lower),
            "abs" => Ok(SelectFunction::Abs),
            "round" => Ok(SelectFunction::Round),
            "trim" => Ok(SelectFunction::Trim),
            _ => Err(StoreError::configuration(format!(
                "Unsupported select function \"{}\"",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectFunction::Sum => "sum",
            SelectFunction::Min => "min",
            SelectFunction::Max => "max",
            SelectFunction::Avg => "avg",
            SelectFunction::Length => "length",
            SelectFunction::Upper => "upper",
            SelectFunction::Lower => "lower",
            SelectFunction::Abs => "abs",
            SelectFunction::Round => "round",
            SelectFunction::Trim => "trim",
        }
    }

    /// Whether the function folds many rows into one value
    pub fn is_reducing(&self) -> bool {
        matches!(
            self,
            SelectFunction::Sum | SelectFunction::Min | SelectFunction::Max | SelectFunction::Avg
        )
    }

    /// Applies a non-reducing function to one value. Values of the wrong
    /// type give `null`.
    pub fn apply_scalar(&self, value: Option<&Value>) -> Value {
        let value = match value {
            Some(v) => v,
            None => return Value::Null,
        };
        match (self, value) {
            (SelectFunction::Length, Value::String(s)) => Value::from(s.chars().count()),
            (SelectFunction::Length, Value::Array(items)) => Value::from(items.len()),
            (SelectFunction::Length, Value::Object(map)) => Value::from(map.len()),
            (SelectFunction::Upper, Value::String(s)) => Value::String(s.to_uppercase()),
            (SelectFunction::Lower, Value::String(s)) => Value::String(s.to_lowercase()),
            (SelectFunction::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            (SelectFunction::Abs, Value::Number(n)) => match n.as_i64() {
                Some(i) => i.checked_abs().map(Value::from).unwrap_or_else(|| float(i.unsigned_abs() as f64)),
                None => n.as_f64().map(|f| float(f.abs())).unwrap_or(Value::Null),
            },
            (SelectFunction::Round, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Value::Number(n.clone())
                } else {
                    n.as_f64().map(|f| float(f.round())).unwrap_or(Value::Null)
                }
            }
            _ => Value::Null,
        }
    }
}

impl fmt::Display for SelectFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Running state of one reducing function over one bucket
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: SelectFunction,
    path: NestedPath,
    rows: usize,
    sum: f64,
    /// Exact sum while every contribution is an integer
    int_sum: Option<i64>,
    min: Option<(f64, Value)>,
    max: Option<(f64, Value)>,
}

impl Accumulator {
    pub fn new(function: SelectFunction, path: NestedPath) -> Self {
        Self {
            function,
            path,
            rows: 0,
            sum: 0.0,
            int_sum: Some(0),
            min: None,
            max: None,
        }
    }

    /// Folds one row in
    pub fn add(&mut self, doc: &Document) {
        self.rows += 1;

        let value = match self.path.get(doc) {
            Some(v) => v,
            None => return,
        };
        let n = match as_number(value) {
            Some(n) => n,
            None => return,
        };

        self.sum += n;
        self.int_sum = match (self.int_sum, value) {
            (Some(acc), Value::Number(num)) => num.as_i64().and_then(|i| acc.checked_add(i)),
            _ => None,
        };

        let numeric = match value {
            Value::Number(_) => value.clone(),
            _ => float(n),
        };
        if self.min.as_ref().map(|(m, _)| n < *m).unwrap_or(true) {
            self.min = Some((n, numeric.clone()));
        }
        if self.max.as_ref().map(|(m, _)| n > *m).unwrap_or(true) {
            self.max = Some((n, numeric));
        }
    }

    /// Final value of the bucket
    pub fn finish(&self) -> Value {
        match self.function {
            SelectFunction::Sum => match self.int_sum {
                Some(i) => Value::from(i),
                None => float(self.sum),
            },
            SelectFunction::Min => self.min.as_ref().map(|(_, v)| v.clone()).unwrap_or(Value::Null),
            SelectFunction::Max => self.max.as_ref().map(|(_, v)| v.clone()).unwrap_or(Value::Null),
            SelectFunction::Avg => {
                if self.rows == 0 {
                    Value::Null
                } else {
                    float(self.sum / self.rows as f64)
                }
            }
            _ => Value::Null,
        }
    }
}

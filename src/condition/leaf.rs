//! Single `(field, operator, operand)` comparisons

use regex::Regex;
use serde_json::{json, Value};

use super::compare::{as_text, compare_values, like_pattern, loose_eq, strict_eq, to_timestamp};
use super::operand::Operand;
use super::operator::Operator;
use crate::document::{Document, NestedPath};
use crate::errors::{StoreError, StoreResult};

static NULL: Value = Value::Null;

/// A validated comparison triple
#[derive(Debug, Clone)]
pub struct Condition {
    path: NestedPath,
    operator: Operator,
    operand: Operand,
    /// Compiled form of a `like` / `not like` pattern
    pattern: Option<Regex>,
}

impl Condition {
    /// Validates the triple. Operand shape errors are `InvalidArgument`,
    /// unknown operators are `ConfigurationError`.
    pub fn new(field: &str, operator: &str, operand: impl Into<Operand>) -> StoreResult<Self> {
        Self::with_operator(field, Operator::parse(operator)?, operand)
    }

    /// Same as [`Condition::new`] with an already-parsed operator
    pub fn with_operator(
        field: &str,
        operator: Operator,
        operand: impl Into<Operand>,
    ) -> StoreResult<Self> {
        let path = NestedPath::parse(field)?;
        let operand = operand.into();
        let mut pattern = None;

        match operator {
            Operator::In | Operator::NotIn => {
                let items = operand.elements().ok_or_else(|| {
                    StoreError::invalid_argument(format!(
                        "\"{}\" on \"{}\" needs an array operand",
                        operator, field
                    ))
                })?;
                require_uniform_temporal(field, operator, &items)?;
            }
            Operator::Between | Operator::NotBetween => {
                let items = operand.elements().unwrap_or_default();
                if items.len() != 2 {
                    return Err(StoreError::invalid_argument(format!(
                        "\"{}\" on \"{}\" needs a [low, high] operand",
                        operator, field
                    )));
                }
                require_uniform_temporal(field, operator, &items)?;
            }
            Operator::Like | Operator::NotLike => {
                let text = operand.as_value().and_then(Value::as_str).ok_or_else(|| {
                    StoreError::invalid_argument(format!(
                        "\"{}\" on \"{}\" needs a string pattern",
                        operator, field
                    ))
                })?;
                pattern = Some(like_pattern(text)?);
            }
            Operator::Exists => {
                if !matches!(operand, Operand::Value(Value::Bool(_))) {
                    return Err(StoreError::invalid_argument(format!(
                        "\"exists\" on \"{}\" needs a boolean operand",
                        field
                    )));
                }
            }
            _ => {}
        }

        Ok(Self {
            path,
            operator,
            operand,
            pattern,
        })
    }

    /// The addressed field
    pub fn path(&self) -> &NestedPath {
        &self.path
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Canonical JSON form, used for cache fingerprints
    pub fn to_json(&self) -> Value {
        json!([self.path.as_str(), self.operator.as_str(), self.operand.to_json()])
    }

    /// Evaluates the comparison against a document. Pure and total.
    pub fn evaluate(&self, doc: &Document) -> bool {
        let field = self.path.get(doc);

        match self.operator {
            Operator::Exists => {
                let wanted = matches!(self.operand, Operand::Value(Value::Bool(true)));
                field.is_some() == wanted
            }
            Operator::Eq | Operator::NotEq | Operator::StrictEq | Operator::StrictNotEq => {
                let strict = matches!(self.operator, Operator::StrictEq | Operator::StrictNotEq);
                let equal = match &self.operand {
                    Operand::DateTime(t) => match to_timestamp(field) {
                        Some(ts) => ts == *t,
                        None => return false,
                    },
                    Operand::Value(v) => {
                        let actual = field.unwrap_or(&NULL);
                        if strict {
                            strict_eq(actual, v)
                        } else {
                            loose_eq(actual, v)
                        }
                    }
                    Operand::List(_) => {
                        let actual = field.unwrap_or(&NULL);
                        strict_eq(actual, &self.operand.to_json())
                    }
                };
                equal != self.operator.is_negated()
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let ordering = match &self.operand {
                    Operand::DateTime(t) => match to_timestamp(field) {
                        Some(ts) => Some(ts.cmp(t)),
                        None => return false,
                    },
                    Operand::Value(v) => compare_values(field.unwrap_or(&NULL), v),
                    Operand::List(_) => None,
                };
                match ordering {
                    Some(o) => match self.operator {
                        Operator::Gt => o.is_gt(),
                        Operator::Gte => o.is_ge(),
                        Operator::Lt => o.is_lt(),
                        _ => o.is_le(),
                    },
                    None => false,
                }
            }
            Operator::Like | Operator::NotLike => {
                let matched = match (&self.pattern, field.and_then(as_text)) {
                    (Some(re), Some(text)) => re.is_match(&text),
                    _ => false,
                };
                matched != self.operator.is_negated()
            }
            Operator::In | Operator::NotIn => {
                let items = self.operand.elements().unwrap_or_default();
                let found = if items.iter().any(|i| i.as_datetime().is_some()) {
                    match to_timestamp(field) {
                        Some(ts) => items.iter().any(|i| i.as_datetime() == Some(&ts)),
                        None => return false,
                    }
                } else {
                    let actual = field.unwrap_or(&NULL);
                    items
                        .iter()
                        .any(|i| i.as_value().map(|v| strict_eq(actual, v)).unwrap_or(false))
                };
                found != self.operator.is_negated()
            }
            Operator::Between | Operator::NotBetween => {
                let items = self.operand.elements().unwrap_or_default();
                let inside = match (items.first(), items.get(1)) {
                    (Some(Operand::DateTime(low)), Some(Operand::DateTime(high))) => {
                        match to_timestamp(field) {
                            Some(ts) => ts >= *low && ts <= *high,
                            None => return false,
                        }
                    }
                    (Some(Operand::Value(low)), Some(Operand::Value(high))) => {
                        let actual = field.unwrap_or(&NULL);
                        compare_values(actual, low).map(|o| o.is_ge()).unwrap_or(false)
                            && compare_values(actual, high).map(|o| o.is_le()).unwrap_or(false)
                    }
                    _ => false,
                };
                inside != self.operator.is_negated()
            }
            Operator::Contains | Operator::NotContains => {
                let found = match field {
                    Some(Value::Array(items)) => match &self.operand {
                        Operand::DateTime(t) => items
                            .iter()
                            .any(|item| to_timestamp(Some(item)).as_ref() == Some(t)),
                        Operand::Value(v) => items.iter().any(|item| loose_eq(item, v)),
                        Operand::List(_) => {
                            let wanted = self.operand.to_json();
                            items.iter().any(|item| strict_eq(item, &wanted))
                        }
                    },
                    _ => false,
                };
                found != self.operator.is_negated()
            }
        }
    }
}

/// A temporal element anywhere in the operand array requires all of them
/// to be temporal.
fn require_uniform_temporal(field: &str, operator: Operator, items: &[Operand]) -> StoreResult<()> {
    let temporal = items.iter().filter(|i| is_temporal(i)).count();
    if temporal > 0 && temporal != items.len() {
        return Err(StoreError::invalid_argument(format!(
            "\"{}\" on \"{}\": when one element is a date, all elements have to be dates",
            operator, field
        )));
    }
    Ok(())
}

fn is_temporal(operand: &Operand) -> bool {
    operand.as_datetime().is_some()
}

//! Comparison operators

use std::fmt;
use std::str::FromStr;

use crate::errors::{StoreError, StoreResult};

/// Operators accepted in a condition triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=` / `==`: equality with type coercion
    Eq,
    /// `===`: type and value equality
    StrictEq,
    /// `!=` / `<>`
    NotEq,
    /// `!==`
    StrictNotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// SQL-style `%` / `_` wildcards, case-insensitive
    Like,
    NotLike,
    /// Strict membership in an operand array
    In,
    NotIn,
    /// Inclusive `[low, high]` range
    Between,
    NotBetween,
    /// Field is an array holding the operand
    Contains,
    NotContains,
    /// Presence test; operand is a boolean
    Exists,
}

impl Operator {
    /// Parses an operator string. Case and surrounding whitespace are ignored.
    pub fn parse(s: &str) -> StoreResult<Self> {
        let normalized = s.trim().to_lowercase();
        let op = match normalized.as_str() {
            "=" | "==" => Operator::Eq,
            "===" => Operator::StrictEq,
            "!=" | "<>" => Operator::NotEq,
            "!==" => Operator::StrictNotEq,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "between" => Operator::Between,
            "not between" => Operator::NotBetween,
            "contains" => Operator::Contains,
            "not contains" => Operator::NotContains,
            "exists" => Operator::Exists,
            _ => {
                return Err(StoreError::configuration(format!(
                    "Unsupported condition operator \"{}\"",
                    s
                )))
            }
        };
        Ok(op)
    }

    /// Canonical spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::StrictEq => "===",
            Operator::NotEq => "!=",
            Operator::StrictNotEq => "!==",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Between => "between",
            Operator::NotBetween => "not between",
            Operator::Contains => "contains",
            Operator::NotContains => "not contains",
            Operator::Exists => "exists",
        }
    }

    /// True for the negated forms of a positive operator
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Operator::NotEq
                | Operator::StrictNotEq
                | Operator::NotLike
                | Operator::NotIn
                | Operator::NotBetween
                | Operator::NotContains
        )
    }

    /// Operand must be an array
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            Operator::In | Operator::NotIn | Operator::Between | Operator::NotBetween
        )
    }
}

impl FromStr for Operator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreErrorCode;

    #[test]
    fn test_aliases_parse_to_same_operator() {
        assert_eq!(Operator::parse("=").unwrap(), Operator::Eq);
        assert_eq!(Operator::parse("==").unwrap(), Operator::Eq);
        assert_eq!(Operator::parse("<>").unwrap(), Operator::NotEq);
        assert_eq!(Operator::parse(" NOT LIKE ").unwrap(), Operator::NotLike);
        assert_eq!("Not In".parse::<Operator>().unwrap(), Operator::NotIn);
    }

    #[test]
    fn test_unknown_operator_is_configuration_error() {
        let err = Operator::parse("~=").unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::Configuration);
    }

    #[test]
    fn test_canonical_spelling_reparses() {
        for op in [
            Operator::StrictEq,
            Operator::Between,
            Operator::NotContains,
            Operator::Exists,
        ] {
            assert_eq!(Operator::parse(op.as_str()).unwrap(), op);
        }
    }
}

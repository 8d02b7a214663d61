//! Boolean condition trees
//!
//! A tree node is a comparison, a nested group, an `and` / `or` token or a
//! labelled predicate closure. Within a group, adjacent results are joined
//! with an implicit `and`.
//!
//! Evaluation is a two-phase fold. `and` merges the next result into the
//! running value immediately; `or` stashes the running value and starts a
//! fresh one. Stashed values are folded in only at the end, which gives
//! `and` higher precedence than `or` without explicit grouping:
//! `[true, "or", false, "and", false]` is `true`.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use super::leaf::Condition;
use super::operand::Operand;
use crate::document::{json_type_name, Document};
use crate::errors::{StoreError, StoreResult};

/// Boolean join token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolJoin {
    And,
    Or,
}

impl BoolJoin {
    /// Parses `and` / `or`, ignoring case
    pub fn parse(s: &str) -> StoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "and" => Ok(BoolJoin::And),
            "or" => Ok(BoolJoin::Or),
            _ => Err(StoreError::invalid_argument(format!(
                "Expected 'and' or 'or' operator got \"{}\"",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoolJoin::And => "and",
            BoolJoin::Or => "or",
        }
    }
}

type PredicateFn = dyn Fn(&Document) -> bool + Send + Sync;

/// A caller-supplied test over the whole document.
///
/// The label stands in for the closure in cache fingerprints, so two
/// predicates with different behaviour need different labels.
#[derive(Clone)]
pub struct Predicate {
    label: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new(
        label: impl Into<String>,
        func: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn call(&self, doc: &Document) -> bool {
        (self.func)(doc)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("label", &self.label).finish()
    }
}

/// A node of a condition tree
#[derive(Debug, Clone)]
pub enum ConditionNode {
    Leaf(Condition),
    Group(Vec<ConditionNode>),
    Join(BoolJoin),
    Predicate(Predicate),
}

/// Intermediate result of one group element
#[derive(Debug, Clone, Copy)]
enum Token {
    Value(bool),
    Join(BoolJoin),
}

impl ConditionNode {
    /// Builds a comparison leaf
    pub fn leaf(field: &str, operator: &str, operand: impl Into<Operand>) -> StoreResult<Self> {
        Ok(ConditionNode::Leaf(Condition::new(field, operator, operand)?))
    }

    /// Builds a group; the structure is checked right away
    pub fn group(nodes: Vec<ConditionNode>) -> StoreResult<Self> {
        let node = ConditionNode::Group(nodes);
        node.validate()?;
        Ok(node)
    }

    /// Builds a predicate node
    pub fn predicate(
        label: impl Into<String>,
        func: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        ConditionNode::Predicate(Predicate::new(label, func))
    }

    /// Checks the group structure without touching any document
    pub fn validate(&self) -> StoreResult<()> {
        match self {
            ConditionNode::Leaf(_) | ConditionNode::Predicate(_) => Ok(()),
            ConditionNode::Join(join) => Err(StoreError::invalid_argument(format!(
                "Malformed where statement! \"{}\" can not stand on its own",
                join.as_str()
            ))),
            ConditionNode::Group(children) => {
                let mut tokens = Vec::with_capacity(children.len());
                for child in children {
                    match child {
                        ConditionNode::Join(join) => tokens.push(Token::Join(*join)),
                        other => {
                            other.validate()?;
                            tokens.push(Token::Value(true));
                        }
                    }
                }
                fold(tokens).map(|_| ())
            }
        }
    }

    /// Evaluates the tree against a document
    pub fn evaluate(&self, doc: &Document) -> StoreResult<bool> {
        match self {
            ConditionNode::Leaf(condition) => Ok(condition.evaluate(doc)),
            ConditionNode::Predicate(predicate) => Ok(predicate.call(doc)),
            ConditionNode::Join(_) => self.validate().map(|_| false),
            ConditionNode::Group(children) if children.is_empty() => fold(Vec::new()),
            ConditionNode::Group(children) => ConditionNode::evaluate_all(children, doc),
        }
    }

    /// Evaluates a list of nodes as one group. An empty list matches
    /// every document.
    pub fn evaluate_all(nodes: &[ConditionNode], doc: &Document) -> StoreResult<bool> {
        if nodes.is_empty() {
            return Ok(true);
        }
        let mut tokens = Vec::with_capacity(nodes.len());
        for node in nodes {
            tokens.push(match node {
                ConditionNode::Join(join) => Token::Join(*join),
                other => Token::Value(other.evaluate(doc)?),
            });
        }
        fold(tokens)
    }

    /// Decodes a tree from JSON.
    ///
    /// An array whose first two elements are strings is a comparison and
    /// must have exactly three elements. Any other array is a group whose
    /// elements are nested arrays or `and` / `or` strings.
    pub fn from_json(value: &Value) -> StoreResult<Self> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(_) => {
                return Err(StoreError::invalid_argument(
                    "Malformed where statement! Associative arrays are not allowed.",
                ))
            }
            other => {
                return Err(StoreError::invalid_argument(format!(
                    "Malformed where statement! Expected an array, got {}",
                    json_type_name(other)
                )))
            }
        };

        if items.is_empty() {
            return Err(StoreError::invalid_argument(
                "Malformed where statement! Where statements can not contain empty arrays.",
            ));
        }

        if let (Some(Value::String(field)), Some(Value::String(operator))) =
            (items.first(), items.get(1))
        {
            if items.len() != 3 {
                return Err(StoreError::invalid_argument(
                    "Where conditions have to be [fieldName, condition, value]",
                ));
            }
            let operand = Operand::from_json(items[2].clone())?;
            return Ok(ConditionNode::Leaf(Condition::new(field, operator, operand)?));
        }

        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            let node = match item {
                Value::Array(_) => ConditionNode::from_json(item)?,
                Value::String(token) => ConditionNode::Join(BoolJoin::parse(token)?),
                other => {
                    return Err(StoreError::invalid_argument(format!(
                        "Invalid nested where statement element! Expected condition or operation, got {}",
                        json_type_name(other)
                    )))
                }
            };
            nodes.push(node);
        }
        ConditionNode::group(nodes)
    }

    /// Canonical JSON form, used for cache fingerprints
    pub fn to_json(&self) -> Value {
        match self {
            ConditionNode::Leaf(condition) => condition.to_json(),
            ConditionNode::Group(children) => {
                Value::Array(children.iter().map(ConditionNode::to_json).collect())
            }
            ConditionNode::Join(join) => json!(join.as_str()),
            ConditionNode::Predicate(predicate) => json!({"$predicate": predicate.label()}),
        }
    }
}

impl From<Condition> for ConditionNode {
    fn from(condition: Condition) -> Self {
        ConditionNode::Leaf(condition)
    }
}

fn fold(tokens: Vec<Token>) -> StoreResult<bool> {
    let mut tokens = tokens.into_iter();

    let mut running = match tokens.next() {
        Some(Token::Value(b)) => b,
        Some(Token::Join(_)) => {
            return Err(StoreError::invalid_argument(
                "Malformed where statement! First part of the statement has to be a condition.",
            ))
        }
        None => {
            return Err(StoreError::invalid_argument(
                "Malformed where statement! Where statements can not contain empty arrays.",
            ))
        }
    };

    let mut stashed_or = Vec::new();

    while let Some(token) = tokens.next() {
        let (join, next) = match token {
            Token::Value(b) => (BoolJoin::And, b),
            Token::Join(join) => match tokens.next() {
                Some(Token::Value(b)) => (join, b),
                Some(Token::Join(_)) => {
                    return Err(StoreError::invalid_argument(
                        "Malformed where statement! Two operations in a row are not allowed.",
                    ))
                }
                None => {
                    return Err(StoreError::invalid_argument(
                        "Malformed where statement! Last part of a condition can not be a operation.",
                    ))
                }
            },
        };

        match join {
            BoolJoin::And => running = running && next,
            BoolJoin::Or => {
                stashed_or.push(running);
                running = next;
            }
        }
    }

    for previous in stashed_or {
        if running {
            break;
        }
        running = previous;
    }

    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreErrorCode;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn constant(b: bool) -> ConditionNode {
        ConditionNode::predicate(if b { "true" } else { "false" }, move |_| b)
    }

    fn or() -> ConditionNode {
        ConditionNode::Join(BoolJoin::Or)
    }

    fn and() -> ConditionNode {
        ConditionNode::Join(BoolJoin::And)
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let d = Document::new();
        let tree = ConditionNode::group(vec![
            constant(true),
            or(),
            constant(false),
            and(),
            constant(false),
        ])
        .unwrap();
        assert!(tree.evaluate(&d).unwrap());

        let tree = ConditionNode::group(vec![
            constant(false),
            and(),
            constant(true),
            or(),
            constant(true),
        ])
        .unwrap();
        assert!(tree.evaluate(&d).unwrap());

        let tree = ConditionNode::group(vec![
            constant(false),
            or(),
            constant(true),
            and(),
            constant(false),
        ])
        .unwrap();
        assert!(!tree.evaluate(&d).unwrap());
    }

    #[test]
    fn test_adjacency_means_and() {
        let d = Document::new();
        let tree = ConditionNode::group(vec![constant(true), constant(false)]).unwrap();
        assert!(!tree.evaluate(&d).unwrap());
    }

    #[test]
    fn test_malformed_groups_rejected() {
        assert!(ConditionNode::group(vec![]).is_err());
        assert!(ConditionNode::group(vec![or(), constant(true)]).is_err());
        assert!(ConditionNode::group(vec![constant(true), or()]).is_err());
        assert!(ConditionNode::group(vec![constant(true), or(), and(), constant(true)]).is_err());
    }

    #[test]
    fn test_from_json_leaf_and_group() {
        let d = doc(json!({"_id": 2, "name": "b"}));
        let tree = ConditionNode::from_json(&json!([
            ["_id", "=", 1], "OR", [["_id", "=", 2], ["name", "=", "b"]]
        ]))
        .unwrap();
        assert!(tree.evaluate(&d).unwrap());

        let leaf = ConditionNode::from_json(&json!(["_id", "=", 3])).unwrap();
        assert!(!leaf.evaluate(&d).unwrap());
    }

    #[test]
    fn test_from_json_errors() {
        let err = ConditionNode::from_json(&json!([])).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::InvalidArgument);

        let err = ConditionNode::from_json(&json!({"0": ["a", "=", 1]})).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::InvalidArgument);

        let err = ConditionNode::from_json(&json!(["a", "=", 1, 2])).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::InvalidArgument);

        let err = ConditionNode::from_json(&json!([["a", "=", 1], "xor", ["b", "=", 1]])).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::InvalidArgument);

        let err = ConditionNode::from_json(&json!(["a", "approx", 1])).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::Configuration);

        let err = ConditionNode::from_json(&json!([["a", "=", 1], 5])).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::InvalidArgument);
    }

    #[test]
    fn test_to_json_labels_predicates() {
        let tree = ConditionNode::group(vec![
            ConditionNode::leaf("a", "=", 1).unwrap(),
            or(),
            ConditionNode::predicate("is_adult", |_| true),
        ])
        .unwrap();
        assert_eq!(
            tree.to_json(),
            json!([["a", "=", 1], "or", {"$predicate": "is_adult"}])
        );
    }
}

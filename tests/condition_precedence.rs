//! Condition Evaluation Tests
//!
//! - Adjacent conditions are and-ed
//! - "and" binds tighter than "or"
//! - Nested groups evaluate as one value
//! - Builder chains produce the same trees as JSON

use serde_json::{json, Value};
use shelfdb::condition::ConditionNode;
use shelfdb::document::into_document;
use shelfdb::{Document, Store, StoreConfig, StoreErrorCode};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn doc(value: Value) -> Document {
    into_document(value).unwrap()
}

fn eval(tree: Value, document: &Document) -> bool {
    ConditionNode::from_json(&tree).unwrap().evaluate(document).unwrap()
}

/// Leaf that is true for `{"t": true}` documents
fn t() -> Value {
    json!(["t", "=", true])
}

/// Leaf that is never true for the test documents
fn f() -> Value {
    json!(["t", "=", "never"])
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn test_and_binds_tighter_than_or() {
    let d = doc(json!({"t": true}));
    // true or (false and false)
    assert!(eval(json!([t(), "or", f(), "and", f()]), &d));
    // (false and true) or false
    assert!(!eval(json!([f(), "and", t(), "or", f()]), &d));
    // false or (true and true)
    assert!(eval(json!([f(), "or", t(), "and", t()]), &d));
}

#[test]
fn test_adjacent_conditions_are_anded() {
    let d = doc(json!({"t": true, "n": 5}));
    assert!(eval(json!([t(), ["n", ">", 1]]), &d));
    assert!(!eval(json!([t(), ["n", ">", 9]]), &d));
}

#[test]
fn test_groups_evaluate_as_a_unit() {
    let d = doc(json!({"t": true}));
    // (true or false) and false
    assert!(!eval(json!([[t(), "or", f()], "and", f()]), &d));
    // true or (false and false), written with an explicit group
    assert!(eval(json!([t(), "or", [f(), "and", f()]]), &d));
}

#[test]
fn test_evaluation_is_repeatable() {
    let d = doc(json!({"t": true, "name": "x"}));
    let tree = ConditionNode::from_json(&json!([f(), "or", ["name", "like", "%x%"]])).unwrap();
    let first = tree.evaluate(&d).unwrap();
    for _ in 0..10 {
        assert_eq!(tree.evaluate(&d).unwrap(), first);
    }
    assert_eq!(d, doc(json!({"t": true, "name": "x"})));
}

// =============================================================================
// Malformed Trees
// =============================================================================

#[test]
fn test_malformed_trees_are_rejected() {
    let bad = [
        json!([]),
        json!({"a": 1}),
        json!(["a", "="]),
        json!([["a", "=", 1], "xor", ["b", "=", 2]]),
        json!([["a", "=", 1], 5]),
    ];
    for tree in bad {
        let err = ConditionNode::from_json(&tree).unwrap_err();
        assert!(err.is_rejection(), "{} should be rejected", tree);
    }
}

#[test]
fn test_unknown_operator_is_configuration_error() {
    let err = ConditionNode::from_json(&json!(["a", "<=>", 1])).unwrap_err();
    assert_eq!(err.code(), StoreErrorCode::Configuration);
}

// =============================================================================
// Builder Chains Over A Store
// =============================================================================

#[test]
fn test_builder_chain_follows_precedence() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), "prec", StoreConfig::with_counter_ids()).unwrap();
    store
        .insert_many(vec![
            json!({"a": 1, "b": 0}),
            json!({"a": 2, "b": 0}),
            json!({"a": 2, "b": 1}),
            json!({"a": 3, "b": 0}),
        ])
        .unwrap();

    // a = 1 or (a = 2 and b = 1)
    let rows = store
        .create_query_builder()
        .where_("a", "=", 1)
        .or_where("a", "=", 2)
        .where_("b", "=", 1)
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    let ids: Vec<&Value> = rows.iter().map(|r| &r["_id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!(3)]);

    let from_json = store
        .find_by(&json!([["a", "=", 1], "or", ["a", "=", 2], "and", ["b", "=", 1]]), &[], None, None)
        .unwrap();
    assert_eq!(from_json, rows);
}

#[test]
fn test_predicate_conditions() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), "preds", StoreConfig::with_counter_ids()).unwrap();
    store
        .insert_many(vec![json!({"tags": ["a", "b"]}), json!({"tags": []}), json!({"x": 1})])
        .unwrap();

    let tagged = store
        .create_query_builder()
        .where_fn("has-tags", |doc| {
            doc.get("tags")
                .and_then(Value::as_array)
                .map_or(false, |tags| !tags.is_empty())
        })
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0]["_id"], json!(1));
}

//! Query Scenario Tests
//!
//! Runs the documented scenarios against a 20-document store:
//! - A: where / orWhere with an impossible and-group
//! - B: in versus or-ed equality
//! - C: group-by with count and sum
//! - E: select always keeps the primary key
//!
//! plus search, distinct, joins, sorting and paging.

use std::collections::HashMap;

use serde_json::{json, Value};
use shelfdb::condition::{ConditionNode, Operand};
use shelfdb::finder::{OrderBy, SearchAlgorithm, SearchMode};
use shelfdb::reducer::{JoinSource, SelectField, SelectFunction};
use shelfdb::{Document, SearchOptions, Store, StoreConfig, StoreErrorCode};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

const COUNTRIES: [&str; 4] = ["Germany", "France", "Italy", "Spain"];

/// Document `i` (1-based) of the fixture
fn fixture_row(i: u64) -> Value {
    json!({
        "name": format!("Book {}", i),
        "country": COUNTRIES[(i as usize - 1) % COUNTRIES.len()],
        "likes": i * 3,
        "price": i * 10,
        "meta": {"pages": 100 + i, "tags": if i % 2 == 0 { vec!["even"] } else { vec!["odd"] }},
    })
}

fn fixture_store(dir: &TempDir) -> Store {
    let store = Store::open(dir.path(), "books", StoreConfig::with_counter_ids()).unwrap();
    store
        .insert_many((1..=20).map(fixture_row).collect())
        .unwrap();
    store
}

fn ids(rows: &[Document]) -> Vec<u64> {
    rows.iter().map(|r| r["_id"].as_u64().unwrap()).collect()
}

// =============================================================================
// Scenario A
// =============================================================================

#[test]
fn test_scenario_a_where_and_or_group() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    let one = store
        .create_query_builder()
        .where_("_id", "=", 1)
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(one.len(), 1);

    let still_one = store
        .create_query_builder()
        .where_("_id", "=", 1)
        .or_where_all(vec![
            ConditionNode::leaf("_id", "=", 2).unwrap(),
            ConditionNode::leaf("_id", "=", 3).unwrap(),
        ])
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ids(&still_one), vec![1]);
}

// =============================================================================
// Scenario B
// =============================================================================

#[test]
fn test_scenario_b_in_matches_or() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    let by_in = store
        .create_query_builder()
        .in_("_id", [1, 2])
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    let by_or = store
        .create_query_builder()
        .where_("_id", "=", 1)
        .or_where("_id", "=", 2)
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();

    assert_eq!(by_in.len(), 2);
    assert_eq!(by_in, by_or);
}

// =============================================================================
// Scenario C
// =============================================================================

#[test]
fn test_scenario_c_group_by_country() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    let rows = store
        .create_query_builder()
        .group_by(&["country"], Some("total"), false)
        .select(vec![
            SelectField::field("country"),
            SelectField::field("total"),
            SelectField::function(SelectFunction::Sum, "likes").alias("totalLikes"),
        ])
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();

    let mut expected: HashMap<String, (u64, u64)> = HashMap::new();
    for i in 1..=20u64 {
        let row = fixture_row(i);
        let entry = expected
            .entry(row["country"].as_str().unwrap().to_string())
            .or_default();
        entry.0 += 1;
        entry.1 += row["likes"].as_u64().unwrap();
    }

    assert_eq!(rows.len(), expected.len());
    for row in &rows {
        let country = row["country"].as_str().unwrap();
        let (total, likes) = expected[country];
        assert_eq!(row["total"], json!(total), "count for {}", country);
        assert_eq!(row["totalLikes"], json!(likes), "likes for {}", country);
    }
}

#[test]
fn test_group_by_rejects_ungrouped_field() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let err = store
        .create_query_builder()
        .group_by(&["country"], None, false)
        .select(["name"])
        .get_query()
        .unwrap()
        .fetch()
        .unwrap_err();
    assert_eq!(err.code(), StoreErrorCode::InvalidArgument);
}

#[test]
fn test_having_filters_groups() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    // Germany holds rows 1, 5, 9, 13, 17: likes 3 + 15 + 27 + 39 + 51 = 135
    let rows = store
        .create_query_builder()
        .group_by(&["country"], None, false)
        .select(vec![
            SelectField::field("country"),
            SelectField::function(SelectFunction::Sum, "likes").alias("likes"),
        ])
        .having("likes", "<", 140)
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["country"], json!("Germany"));
    assert_eq!(rows[0]["likes"], json!(135));
}

// =============================================================================
// Scenario E
// =============================================================================

#[test]
fn test_scenario_e_select_keeps_primary_key() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);

    for fields in [vec!["_id", "price"], vec!["price"]] {
        let rows = store
            .create_query_builder()
            .select(fields)
            .get_query()
            .unwrap()
            .fetch()
            .unwrap();
        assert_eq!(rows.len(), 20);
        for row in &rows {
            assert!(row.contains_key("_id"));
            assert!(row.contains_key("price"));
            assert!(!row.contains_key("name"));
            assert_eq!(row.len(), 2);
        }
    }
}

#[test]
fn test_select_aliases_and_nested_paths() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let row = store
        .create_query_builder()
        .where_("_id", "=", 2)
        .select(vec![
            SelectField::aliased("pages", "meta.pages"),
            SelectField::field("meta.tags"),
            SelectField::function(SelectFunction::Upper, "name").alias("title"),
        ])
        .get_query()
        .unwrap()
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(row["pages"], json!(102));
    assert_eq!(row["meta"]["tags"], json!(["even"]));
    assert_eq!(row["title"], json!("BOOK 2"));
}

#[test]
fn test_aggregates_without_group_collapse() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let rows = store
        .create_query_builder()
        .select(vec![
            SelectField::function(SelectFunction::Sum, "price").alias("sum"),
            SelectField::function(SelectFunction::Max, "price").alias("max"),
            SelectField::function(SelectFunction::Avg, "price").alias("avg"),
        ])
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["sum"], json!(2100));
    assert_eq!(rows[0]["max"], json!(200));
    assert_eq!(rows[0]["avg"].as_f64(), Some(105.0));
}

#[test]
fn test_except_removes_fields() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let row = store
        .create_query_builder()
        .except(&["meta", "price"])
        .get_query()
        .unwrap()
        .first()
        .unwrap()
        .unwrap();
    assert!(!row.contains_key("meta"));
    assert!(!row.contains_key("price"));
    assert!(row.contains_key("name"));
}

// =============================================================================
// Sorting, Paging, Distinct
// =============================================================================

#[test]
fn test_sort_skip_limit() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let rows = store
        .find_all(&[OrderBy::desc("price")], Some(3), Some(2))
        .unwrap();
    assert_eq!(ids(&rows), vec![18, 17, 16]);
}

#[test]
fn test_multi_key_sort() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let rows = store
        .create_query_builder()
        .order_by("country", "asc")
        .order_by("likes", "desc")
        .limit(3)
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    // France: rows 2, 6, 10, 14, 18
    assert_eq!(ids(&rows), vec![18, 14, 10]);
}

#[test]
fn test_distinct_keeps_first_per_value() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let rows = store
        .create_query_builder()
        .distinct(&["country"])
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2, 3, 4]);
}

#[test]
fn test_nested_path_conditions() {
    let dir = TempDir::new().unwrap();
    let store = fixture_store(&dir);
    let rows = store
        .create_query_builder()
        .where_("meta.pages", "between", Operand::list([Operand::from(105), Operand::from(107)]))
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ids(&rows), vec![5, 6, 7]);
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn test_search_scores_and_filters() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), "articles", StoreConfig::with_counter_ids()).unwrap();
    store
        .insert_many(vec![
            json!({"title": "Rust storage engines", "body": "storage storage"}),
            json!({"title": "Cooking", "body": "nothing relevant"}),
            json!({"title": "Notes", "body": "a storage note"}),
        ])
        .unwrap();

    let rows = store
        .create_query_builder()
        .search(&["title", "body"], "storage")
        .order_by("searchScore", "desc")
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 3]);
    assert!(rows[0]["searchScore"].as_f64().unwrap() > rows[1]["searchScore"].as_f64().unwrap());

    let strict = SearchOptions {
        mode: SearchMode::And,
        algorithm: SearchAlgorithm::Prioritize,
        score_key: None,
        ..SearchOptions::default()
    };
    let rows = store
        .create_query_builder()
        .search_with(&["title", "body"], "storage note", strict)
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ids(&rows), vec![3]);
    assert!(!rows[0].contains_key("searchScore"));
}

// =============================================================================
// Joins
// =============================================================================

#[test]
fn test_join_attaches_sub_query_results() {
    let dir = TempDir::new().unwrap();
    let authors = Store::open(dir.path(), "authors", StoreConfig::with_counter_ids()).unwrap();
    let books = Store::open(dir.path(), "titles", StoreConfig::with_counter_ids()).unwrap();
    authors
        .insert_many(vec![json!({"name": "Ann"}), json!({"name": "Bo"})])
        .unwrap();
    books
        .insert_many(vec![
            json!({"author": 1, "title": "First"}),
            json!({"author": 1, "title": "Second"}),
            json!({"author": 2, "title": "Third"}),
        ])
        .unwrap();

    let books_for_join = books.clone();
    let rows = authors
        .create_query_builder()
        .join("books", move |author| {
            Ok(JoinSource::from(
                books_for_join
                    .create_query_builder()
                    .where_("author", "=", author["_id"].clone()),
            ))
        })
        .order_by("name", "asc")
        .get_query()
        .unwrap()
        .fetch()
        .unwrap();

    assert_eq!(rows[0]["books"].as_array().unwrap().len(), 2);
    assert_eq!(rows[1]["books"][0]["title"], json!("Third"));
}

//! Document scan pipeline
//!
//! Stage order is fixed:
//!
//! 1. Read every document; skip unreadable ones
//! 2. Condition tree, optionally stopping at the first match
//! 3. Distinct, against the documents accepted so far
//! 4. Joins
//! 5. Search filter and score
//! 6. Group-by, or
//! 7. Select
//! 8. Having
//! 9. Except
//! 10. Sort
//! 11. Skip, then limit
//!
//! Scans for writes need whole stored documents back, so joins,
//! projection, grouping, except and the search score are left out. An
//! ungrouped having still filters them.

use serde_json::Value;

use super::search::SearchScorer;
use super::sorter::DocumentSorter;
use crate::condition::ConditionNode;
use crate::document::{decode_document, Document, DocumentId, NestedPath};
use crate::errors::StoreResult;
use crate::observability::{log_event_with_fields, Event};
use crate::query::QueryConfig;
use crate::reducer::{except, group_by, join, select};
use crate::storage::DocumentStorage;

/// What kind of read the scan serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Stop after the first match when nothing later could change it
    pub stop_at_first: bool,
    /// Run join expansion
    pub joins: bool,
    /// Run select, group-by, having and except
    pub reduce: bool,
}

impl ScanOptions {
    /// Plain fetch
    pub fn fetch() -> Self {
        Self {
            stop_at_first: false,
            joins: true,
            reduce: true,
        }
    }

    /// First matching document
    pub fn first() -> Self {
        Self {
            stop_at_first: true,
            ..Self::fetch()
        }
    }

    /// Children of a join; these never join again
    pub fn join_child() -> Self {
        Self {
            joins: false,
            ..Self::fetch()
        }
    }

    /// Documents about to be updated or deleted
    pub fn mutation() -> Self {
        Self {
            stop_at_first: false,
            joins: false,
            reduce: false,
        }
    }
}

/// Runs a query configuration over a store's documents
pub struct DocumentFinder<'a> {
    storage: &'a dyn DocumentStorage,
    config: &'a QueryConfig,
    primary_key: &'a str,
}

impl<'a> DocumentFinder<'a> {
    pub fn new(storage: &'a dyn DocumentStorage, config: &'a QueryConfig, primary_key: &'a str) -> Self {
        Self {
            storage,
            config,
            primary_key,
        }
    }

    /// Runs every stage and returns the result rows
    pub fn find(&self, options: ScanOptions) -> StoreResult<Vec<Document>> {
        let config = self.config;

        let distinct = config
            .distinct
            .iter()
            .map(|f| NestedPath::parse(f))
            .collect::<StoreResult<Vec<_>>>()?;
        let scorer = match &config.search {
            Some(spec) => Some(SearchScorer::new(&spec.fields, &spec.query, &spec.options)?),
            None => None,
        };
        let stop_early = options.stop_at_first && self.first_match_is_final();

        let mut rows = self.scan(&distinct, stop_early)?;
        let scanned = rows.len();

        if options.joins && options.reduce && !config.joins.is_empty() && !rows.is_empty() {
            rows = join(rows, &config.joins)?;
        }

        if let (Some(scorer), Some(spec)) = (&scorer, &config.search) {
            let score_key = if options.reduce {
                spec.options.score_key.as_deref()
            } else {
                None
            };
            rows = scorer.apply(rows, score_key);
        }

        if options.reduce {
            rows = match &config.group_by {
                Some(spec) => group_by(rows, spec, &config.select)?,
                None => select(rows, &config.select, self.primary_key)?,
            };
            rows = self.having(rows)?;
            rows = except(rows, &config.except)?;
        } else if config.group_by.is_none() {
            // Grouped rows have no backing document, so only an ungrouped
            // having can narrow a write
            rows = self.having(rows)?;
        }

        DocumentSorter::sort(&mut rows, &config.order_by)?;

        let rows: Vec<Document> = rows
            .into_iter()
            .skip(config.skip.unwrap_or(0))
            .take(config.limit.unwrap_or(usize::MAX))
            .collect();

        log_event_with_fields(
            Event::QueryExecuted,
            &[
                ("matched", &scanned.to_string()),
                ("returned", &rows.len().to_string()),
            ],
        );
        Ok(rows)
    }

    /// Keeps rows matching the having conditions
    fn having(&self, rows: Vec<Document>) -> StoreResult<Vec<Document>> {
        if self.config.having.is_empty() {
            return Ok(rows);
        }
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if ConditionNode::evaluate_all(&self.config.having, &row)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    /// Stages 1 to 3
    fn scan(&self, distinct: &[NestedPath], stop_early: bool) -> StoreResult<Vec<Document>> {
        let mut accepted: Vec<Document> = Vec::new();

        for id in self.storage.list_document_ids()? {
            let doc = match self.load(&id) {
                Some(doc) => doc,
                None => continue,
            };

            if !ConditionNode::evaluate_all(&self.config.conditions, &doc)? {
                continue;
            }

            if !distinct.is_empty() && is_duplicate(&accepted, &doc, distinct) {
                continue;
            }

            accepted.push(doc);
            if stop_early {
                break;
            }
        }
        Ok(accepted)
    }

    /// Reads and decodes one document. Anything unreadable is logged and
    /// skipped.
    fn load(&self, id: &DocumentId) -> Option<Document> {
        let id_text = id.to_string();
        let skip = |reason: &str| {
            log_event_with_fields(Event::DocumentSkipped, &[("id", &id_text), ("reason", reason)]);
        };

        let bytes = match self.storage.read_document(id) {
            Ok(Some(bytes)) => bytes,
            // Deleted since listing
            Ok(None) => return None,
            Err(e) => {
                skip(&e.to_string());
                return None;
            }
        };

        let doc = match decode_document(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                skip(&e.to_string());
                return None;
            }
        };

        if !doc.contains_key(self.primary_key) {
            skip("missing primary key");
            return None;
        }
        Some(doc)
    }

    /// Whether the first match is guaranteed to be the first result row
    fn first_match_is_final(&self) -> bool {
        let config = self.config;
        config.order_by.is_empty()
            && config.search.is_none()
            && config.group_by.is_none()
            && config.having.is_empty()
            && !config.has_reducing_select()
            && config.skip.unwrap_or(0) == 0
    }
}

/// A candidate is a duplicate when some accepted document equals it on
/// every distinct field
fn is_duplicate(accepted: &[Document], candidate: &Document, fields: &[NestedPath]) -> bool {
    let key: Vec<Option<&Value>> = fields.iter().map(|p| p.get(candidate)).collect();
    accepted.iter().any(|doc| {
        fields
            .iter()
            .zip(&key)
            .all(|(path, value)| path.get(doc) == *value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::BoolJoin;
    use crate::config::SearchOptions;
    use crate::finder::OrderBy;
    use crate::query::SearchSpec;
    use crate::reducer::{GroupBySpec, SelectField};
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let docs = [
            json!({"_id": 1, "name": "Ann", "city": "Oslo", "age": 31}),
            json!({"_id": 2, "name": "Bob", "city": "Rome", "age": 25}),
            json!({"_id": 3, "name": "Cid", "city": "Oslo", "age": 40}),
            json!({"_id": 4, "name": "Dee", "city": "Rome", "age": 25}),
        ];
        for doc in docs {
            let id = DocumentId::Counter(doc["_id"].as_u64().unwrap());
            storage.write_document(&id, doc.to_string().as_bytes()).unwrap();
        }
        storage
    }

    fn ids(rows: &[Document]) -> Vec<u64> {
        rows.iter().map(|d| d["_id"].as_u64().unwrap()).collect()
    }

    fn run(storage: &MemoryStorage, config: &QueryConfig, options: ScanOptions) -> Vec<Document> {
        DocumentFinder::new(storage, config, "_id").find(options).unwrap()
    }

    #[test]
    fn test_conditions_sort_and_window() {
        let storage = storage();
        let config = QueryConfig {
            conditions: vec![ConditionNode::leaf("age", ">", 24).unwrap()],
            order_by: vec![OrderBy::desc("age"), OrderBy::asc("name")],
            skip: Some(1),
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(ids(&run(&storage, &config, ScanOptions::fetch())), vec![1, 2]);
    }

    #[test]
    fn test_or_precedence_in_root_group() {
        let storage = storage();
        let config = QueryConfig {
            conditions: vec![
                ConditionNode::leaf("city", "=", "Oslo").unwrap(),
                ConditionNode::Join(BoolJoin::Or),
                ConditionNode::leaf("age", "=", 25).unwrap(),
                ConditionNode::Join(BoolJoin::And),
                ConditionNode::leaf("name", "=", "Dee").unwrap(),
            ],
            order_by: vec![OrderBy::asc("_id")],
            ..Default::default()
        };
        assert_eq!(ids(&run(&storage, &config, ScanOptions::fetch())), vec![1, 3, 4]);
    }

    #[test]
    fn test_corrupt_documents_are_skipped() {
        let storage = storage();
        storage.insert_raw(DocumentId::Counter(9), "{broken").unwrap();
        storage.insert_raw(DocumentId::Counter(10), "[1, 2]").unwrap();
        storage.insert_raw(DocumentId::Counter(11), r#"{"name": "no id"}"#).unwrap();

        let rows = run(&storage, &QueryConfig::default(), ScanOptions::fetch());
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_distinct_keeps_first_accepted() {
        let storage = storage();
        let config = QueryConfig {
            distinct: vec!["city".into()],
            order_by: vec![OrderBy::asc("_id")],
            ..Default::default()
        };
        // Memory storage lists in id order
        assert_eq!(ids(&run(&storage, &config, ScanOptions::fetch())), vec![1, 2]);
    }

    #[test]
    fn test_stop_at_first() {
        let storage = storage();
        let config = QueryConfig {
            conditions: vec![ConditionNode::leaf("city", "=", "Rome").unwrap()],
            ..Default::default()
        };
        assert_eq!(run(&storage, &config, ScanOptions::first()).len(), 1);

        // A sort could change which row is first, so the scan runs through
        let sorted = QueryConfig {
            order_by: vec![OrderBy::desc("_id")],
            ..config
        };
        let rows = run(&storage, &sorted, ScanOptions::first());
        assert_eq!(ids(&rows), vec![4, 2]);
    }

    #[test]
    fn test_group_then_having_then_sort() {
        let storage = storage();
        let config = QueryConfig {
            group_by: Some(GroupBySpec::new(vec!["city".into()]).with_count_key("n")),
            having: vec![ConditionNode::leaf("n", ">=", 2).unwrap()],
            order_by: vec![OrderBy::asc("city")],
            ..Default::default()
        };
        let rows = run(&storage, &config, ScanOptions::fetch());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["city"], json!("Oslo"));
        assert_eq!(rows[0]["n"], json!(2));
    }

    #[test]
    fn test_select_and_except() {
        let storage = storage();
        let config = QueryConfig {
            select: vec![SelectField::field("name"), SelectField::field("city")],
            except: vec!["city".into()],
            order_by: vec![OrderBy::asc("_id")],
            limit: Some(1),
            ..Default::default()
        };
        let rows = run(&storage, &config, ScanOptions::fetch());
        assert_eq!(rows[0], json!({"_id": 1, "name": "Ann"}).as_object().unwrap().clone());
    }

    #[test]
    fn test_search_scores_only_when_reducing() {
        let storage = storage();
        let config = QueryConfig {
            search: Some(SearchSpec {
                fields: vec!["name".into()],
                query: "bob".into(),
                options: SearchOptions::default(),
            }),
            ..Default::default()
        };
        let rows = run(&storage, &config, ScanOptions::fetch());
        assert_eq!(ids(&rows), vec![2]);
        assert!(rows[0].contains_key("searchScore"));

        let rows = run(&storage, &config, ScanOptions::mutation());
        assert_eq!(ids(&rows), vec![2]);
        assert!(!rows[0].contains_key("searchScore"));
    }

    #[test]
    fn test_mutation_scan_skips_projection() {
        let storage = storage();
        let config = QueryConfig {
            select: vec![SelectField::field("name")],
            conditions: vec![ConditionNode::leaf("_id", "=", 3).unwrap()],
            ..Default::default()
        };
        let rows = run(&storage, &config, ScanOptions::mutation());
        assert_eq!(rows[0]["age"], json!(40));
    }

    #[test]
    fn test_mutation_scan_applies_ungrouped_having() {
        let storage = storage();
        let config = QueryConfig {
            having: vec![ConditionNode::leaf("age", ">", 30).unwrap()],
            ..Default::default()
        };
        let rows = run(&storage, &config, ScanOptions::mutation());
        assert_eq!(ids(&rows), vec![1, 3]);
        assert_eq!(ids(&run(&storage, &config, ScanOptions::fetch())), vec![1, 3]);
    }

    #[test]
    fn test_mutation_scan_ignores_grouped_having() {
        let storage = storage();
        let config = QueryConfig {
            group_by: Some(GroupBySpec::new(vec!["city".to_string()]).with_count_key("n")),
            having: vec![ConditionNode::leaf("n", ">", 5).unwrap()],
            ..Default::default()
        };
        let rows = run(&storage, &config, ScanOptions::mutation());
        assert_eq!(rows.len(), 4);
    }
}

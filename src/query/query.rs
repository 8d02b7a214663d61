//! Executable query
//!
//! A [`Query`] is a frozen snapshot of a builder. Reads go through the
//! store's cache when the resolved policy enables it; writes always scan
//! storage and invalidate no-lifetime cache entries afterwards, whether or
//! not they succeeded.

use serde_json::Value;

use super::config::{QueryConfig, ResultShape};
use crate::document::{into_document, Document};
use crate::errors::StoreResult;
use crate::finder::{DocumentFinder, ScanOptions};
use crate::mutator::{DeleteOutcome, DeleteReturn, DocumentUpdater};
use crate::store::Store;

/// A configured query bound to a store
#[derive(Debug, Clone)]
pub struct Query {
    store: Store,
    config: QueryConfig,
}

impl Query {
    pub(crate) fn new(store: Store, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    // ==================== Reads ====================

    /// All result rows
    pub fn fetch(&self) -> StoreResult<Vec<Document>> {
        self.read(ResultShape::Many, ScanOptions::fetch())
    }

    /// First result row, if any
    pub fn first(&self) -> StoreResult<Option<Document>> {
        let rows = self.read(ResultShape::Single, ScanOptions::first())?;
        Ok(rows.into_iter().next())
    }

    /// Whether the query has at least one result row
    pub fn exists(&self) -> StoreResult<bool> {
        Ok(self.first()?.is_some())
    }

    /// Number of result rows
    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.fetch()?.len())
    }

    /// Rows for a join; never cached, never joins again
    pub(crate) fn fetch_as_join(&self) -> StoreResult<Vec<Document>> {
        self.scan(ResultShape::Many, ScanOptions::join_child())
    }

    fn read(&self, shape: ResultShape, options: ScanOptions) -> StoreResult<Vec<Document>> {
        let (enabled, lifetime) = self.config.cache.resolve(self.store.config());
        // Join children come from producers and other stores whose writes
        // never reach this cache
        if !enabled || !self.config.joins.is_empty() {
            return self.scan(shape, options);
        }

        let cache = self.store.cache();
        let token = self.config.token(shape);
        if self.config.cache.regenerate {
            cache.delete(&token)?;
        } else if let Some(rows) = cache.get(&token)? {
            return Ok(rows);
        }

        let rows = self.scan(shape, options)?;
        cache.set(&token, &rows, lifetime)?;
        Ok(rows)
    }

    fn scan(&self, shape: ResultShape, options: ScanOptions) -> StoreResult<Vec<Document>> {
        let finder = DocumentFinder::new(
            self.store.storage(),
            &self.config,
            self.store.primary_key(),
        );
        let mut rows = finder.find(options)?;
        if shape == ResultShape::Single {
            rows.truncate(1);
        }
        Ok(rows)
    }

    // ==================== Writes ====================

    /// Stored documents the query matches
    fn targets(&self) -> StoreResult<Vec<Document>> {
        self.scan(ResultShape::Many, ScanOptions::mutation())
    }

    fn updater(&self) -> DocumentUpdater<'_> {
        DocumentUpdater::new(self.store.storage(), self.store.primary_key())
    }

    /// Merges `changes` into every matching document. Keys may be dot paths.
    /// Returns false when nothing matched or a matched document vanished.
    pub fn update(&self, changes: Value) -> StoreResult<bool> {
        Ok(self.update_returning(changes)?.is_some())
    }

    /// Like [`Query::update`] but hands back the updated documents
    pub fn update_returning(&self, changes: Value) -> StoreResult<Option<Vec<Document>>> {
        let changes = into_document(changes)?;
        let result = self
            .targets()
            .and_then(|targets| self.updater().update(&targets, &changes));
        self.store.finish_write(result)
    }

    /// Deletes every matching document
    pub fn delete(&self, mode: DeleteReturn) -> StoreResult<DeleteOutcome> {
        let result = self
            .targets()
            .and_then(|targets| self.updater().delete(&targets, mode));
        self.store.finish_write(result)
    }

    /// Removes fields from every matching document. The primary key cannot
    /// be removed.
    pub fn remove_fields(&self, fields: &[&str]) -> StoreResult<Option<Vec<Document>>> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let result = self
            .targets()
            .and_then(|targets| self.updater().remove_fields(&targets, &fields));
        self.store.finish_write(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Store {
        let store = Store::open(dir.path(), "items", StoreConfig::with_counter_ids()).unwrap();
        store
            .insert_many(vec![
                json!({"name": "a", "qty": 1}),
                json!({"name": "b", "qty": 5}),
                json!({"name": "c", "qty": 9}),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_fetch_is_cached_until_write() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let query = s.create_query_builder().where_("qty", ">", 2).get_query().unwrap();

        assert_eq!(query.fetch().unwrap().len(), 2);
        assert_eq!(s.cache().len().unwrap(), 1);

        s.insert(json!({"name": "d", "qty": 7})).unwrap();
        assert!(s.cache().is_empty().unwrap());
        assert_eq!(query.fetch().unwrap().len(), 3);
    }

    #[test]
    fn test_disabled_cache_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let query = s.create_query_builder().disable_cache().get_query().unwrap();
        assert_eq!(query.count().unwrap(), 3);
        assert!(s.cache().is_empty().unwrap());
    }

    #[test]
    fn test_first_and_exists() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let first = s
            .create_query_builder()
            .order_by("qty", "desc")
            .get_query()
            .unwrap()
            .first()
            .unwrap()
            .unwrap();
        assert_eq!(first["name"], json!("c"));

        let none = s.create_query_builder().where_("qty", ">", 100).get_query().unwrap();
        assert!(!none.exists().unwrap());
    }

    #[test]
    fn test_update_and_delete() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let query = s.create_query_builder().where_("qty", "<", 6).get_query().unwrap();
        assert!(query.update(json!({"meta.seen": true})).unwrap());
        let seen = s.find_by(&json!(["meta.seen", "=", true]), &[], None, None).unwrap();
        assert_eq!(seen.len(), 2);

        let outcome = query.delete(DeleteReturn::Count).unwrap();
        assert_eq!(outcome, DeleteOutcome::Count(2));
        assert_eq!(s.count().unwrap(), 1);
    }

    #[test]
    fn test_update_with_no_match_is_false() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let query = s.create_query_builder().where_("qty", ">", 100).get_query().unwrap();
        assert!(!query.update(json!({"qty": 0})).unwrap());
    }

    #[test]
    fn test_remove_fields_keeps_primary_key() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let query = s.create_query_builder().get_query().unwrap();
        let updated = query.remove_fields(&["qty"]).unwrap().unwrap();
        assert_eq!(updated.len(), 3);
        assert!(updated.iter().all(|d| !d.contains_key("qty") && d.contains_key("_id")));
        assert!(query.remove_fields(&["_id"]).is_err());
    }
}

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::cache::QueryCache;
use crate::config::{IdStrategy, StoreConfig};
use crate::document::{decode_document, encode_document, into_document, Document, DocumentId};
use crate::errors::{StoreError, StoreResult};
use crate::finder::OrderBy;
use crate::mutator::{DeleteOutcome, DeleteReturn, DocumentUpdater};
use crate::observability::{log_event_with_fields, Event};
use crate::query::QueryBuilder;
use crate::storage::{
    CounterIdGenerator, DocumentStorage, FileStorage, IdGenerator, UuidIdGenerator, COUNTER_FILE,
};

/// Subdirectory holding document files
pub const DATA_DIR: &str = "data";

/// Subdirectory holding cache entries
pub const CACHE_DIR: &str = "cache";

struct StoreInner {
    name: String,
    /// `None` for stores built over a custom backend
    root: Option<PathBuf>,
    config: StoreConfig,
    storage: Box<dyn DocumentStorage>,
    ids: Box<dyn IdGenerator>,
    cache: QueryCache,
}

/// Cheaply cloneable handle to one store
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("root", &self.inner.root)
            .finish()
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_argument(format!(
            "Invalid store name \"{}\": use letters, digits, '_' or '-'",
            name
        )))
    }
}

impl Store {
    /// Opens `<db_root>/<name>`, creating it if needed
    pub fn open(db_root: impl AsRef<Path>, name: &str, config: StoreConfig) -> StoreResult<Self> {
        validate_name(name)?;
        config.validate()?;

        let root = db_root.as_ref().join(name);
        let storage = FileStorage::open(root.join(DATA_DIR))?;
        let cache = QueryCache::open(root.join(CACHE_DIR))?;
        let ids: Box<dyn IdGenerator> = match config.id_strategy {
            IdStrategy::Uuid => Box::new(UuidIdGenerator),
            IdStrategy::Counter => Box::new(CounterIdGenerator::persistent(root.join(COUNTER_FILE))),
        };

        log_event_with_fields(
            Event::StoreOpened,
            &[("path", &root.display().to_string()), ("store", name)],
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                name: name.to_string(),
                root: Some(root),
                config,
                storage: Box::new(storage),
                ids,
                cache,
            }),
        })
    }

    /// Store over caller-supplied storage and id generation
    pub fn with_backend(
        name: &str,
        config: StoreConfig,
        storage: Box<dyn DocumentStorage>,
        ids: Box<dyn IdGenerator>,
        cache: QueryCache,
    ) -> StoreResult<Self> {
        validate_name(name)?;
        config.validate()?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                name: name.to_string(),
                root: None,
                config,
                storage,
                ids,
                cache,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Store directory, if file-backed
    pub fn root(&self) -> Option<&Path> {
        self.inner.root.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn primary_key(&self) -> &str {
        &self.inner.config.primary_key
    }

    pub fn storage(&self) -> &dyn DocumentStorage {
        self.inner.storage.as_ref()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    /// New builder over this store
    pub fn create_query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.clone())
    }

    /// Drops cache entries that have no lifetime
    pub fn invalidate(&self) -> StoreResult<usize> {
        self.inner.cache.delete_all_with_no_lifetime()
    }

    /// Invalidates after a write attempt. The write's own error wins over
    /// an invalidation error.
    pub(crate) fn finish_write<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        let purged = self.invalidate();
        let value = result?;
        purged?;
        Ok(value)
    }

    fn updater(&self) -> DocumentUpdater<'_> {
        DocumentUpdater::new(self.storage(), self.primary_key())
    }

    fn id_of(&self, doc: &Document) -> StoreResult<DocumentId> {
        let value = doc.get(self.primary_key()).ok_or_else(|| {
            StoreError::invalid_argument(format!(
                "Document has no primary key \"{}\"",
                self.primary_key()
            ))
        })?;
        DocumentId::from_value(value)
    }

    // ==================== Inserts ====================

    /// Stores a new document under a freshly issued id. A primary key in
    /// `data` is ignored.
    pub fn insert(&self, data: Value) -> StoreResult<Document> {
        let result = into_document(data).and_then(|doc| self.write_new(doc));
        self.finish_write(result)
    }

    /// Inserts several documents. All of them are checked to be objects
    /// before any is written.
    pub fn insert_many(&self, data: Vec<Value>) -> StoreResult<Vec<Document>> {
        let result = data
            .into_iter()
            .map(into_document)
            .collect::<StoreResult<Vec<_>>>()
            .and_then(|docs| docs.into_iter().map(|doc| self.write_new(doc)).collect());
        self.finish_write(result)
    }

    fn write_new(&self, mut doc: Document) -> StoreResult<Document> {
        let id = self.inner.ids.next_id()?;
        doc.insert(self.primary_key().to_string(), id.to_value());
        self.write_with_id(&id, &doc)?;
        Ok(doc)
    }

    fn write_with_id(&self, id: &DocumentId, doc: &Document) -> StoreResult<()> {
        let bytes = encode_document(doc)?;
        self.storage().write_document(id, &bytes)?;
        log_event_with_fields(
            Event::DocumentInserted,
            &[("id", &id.to_string()), ("store", self.name())],
        );
        Ok(())
    }

    // ==================== Reads ====================

    /// Every document, optionally sorted and paged
    pub fn find_all(
        &self,
        order_by: &[OrderBy],
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> StoreResult<Vec<Document>> {
        self.paged(self.create_query_builder(), order_by, limit, skip)
            .get_query()?
            .fetch()
    }

    /// Reads one document straight from storage
    pub fn find_by_id(&self, id: impl Into<DocumentId>) -> StoreResult<Option<Document>> {
        match self.storage().read_document(&id.into())? {
            Some(bytes) => decode_document(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Documents matching a JSON condition tree
    pub fn find_by(
        &self,
        criteria: &Value,
        order_by: &[OrderBy],
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> StoreResult<Vec<Document>> {
        let builder = self.create_query_builder().where_json(criteria);
        self.paged(builder, order_by, limit, skip).get_query()?.fetch()
    }

    /// First document matching a JSON condition tree
    pub fn find_one_by(&self, criteria: &Value) -> StoreResult<Option<Document>> {
        self.create_query_builder()
            .where_json(criteria)
            .get_query()?
            .first()
    }

    /// Full-text search with the store's search defaults
    pub fn search(
        &self,
        fields: &[&str],
        query: &str,
        order_by: &[OrderBy],
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> StoreResult<Vec<Document>> {
        let builder = self.create_query_builder().search(fields, query);
        self.paged(builder, order_by, limit, skip).get_query()?.fetch()
    }

    /// Number of readable documents
    pub fn count(&self) -> StoreResult<usize> {
        self.create_query_builder()
            .select([self.primary_key()])
            .get_query()?
            .count()
    }

    fn paged(
        &self,
        mut builder: QueryBuilder,
        order_by: &[OrderBy],
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> QueryBuilder {
        for order in order_by {
            builder = builder.order_by_key(order.clone());
        }
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        if let Some(skip) = skip {
            builder = builder.skip(skip);
        }
        builder
    }

    // ==================== Updates ====================

    /// Sets `changes` (dot-path keys) on one document. `None` if it does not
    /// exist.
    pub fn update_by_id(&self, id: impl Into<DocumentId>, changes: Value) -> StoreResult<Option<Document>> {
        let id = id.into();
        let updated = self
            .create_query_builder()
            .where_(self.primary_key(), "=", id.to_value())
            .get_query()?
            .update_returning(changes)?;
        Ok(updated.and_then(|docs| docs.into_iter().next()))
    }

    /// Replaces whole documents by primary key. Nothing is written and
    /// `false` returned if any of them does not exist.
    pub fn update_documents(&self, documents: Vec<Value>) -> StoreResult<bool> {
        let result = documents
            .into_iter()
            .map(into_document)
            .collect::<StoreResult<Vec<_>>>()
            .and_then(|docs| {
                for doc in &docs {
                    self.id_of(doc)?;
                }
                self.updater().replace(&docs)
            });
        self.finish_write(result)
    }

    /// Replaces the document with the same primary key, or inserts it.
    ///
    /// Without a primary key the document is inserted under a new id. With
    /// an unknown primary key it is stored under that key when
    /// `auto_generate_id` is false, and under a new id otherwise.
    pub fn update_or_insert(&self, data: Value, auto_generate_id: bool) -> StoreResult<Document> {
        let result = into_document(data).and_then(|doc| self.upsert(doc, auto_generate_id));
        self.finish_write(result)
    }

    /// [`Store::update_or_insert`] for several documents
    pub fn update_or_insert_many(&self, data: Vec<Value>, auto_generate_id: bool) -> StoreResult<Vec<Document>> {
        let result = data
            .into_iter()
            .map(into_document)
            .collect::<StoreResult<Vec<_>>>()
            .and_then(|docs| {
                docs.into_iter()
                    .map(|doc| self.upsert(doc, auto_generate_id))
                    .collect()
            });
        self.finish_write(result)
    }

    fn upsert(&self, doc: Document, auto_generate_id: bool) -> StoreResult<Document> {
        if !doc.contains_key(self.primary_key()) {
            return self.write_new(doc);
        }
        // `replace` reports a missing document instead of writing it
        if self.updater().replace(std::slice::from_ref(&doc))? {
            return Ok(doc);
        }
        if auto_generate_id {
            return self.write_new(doc);
        }
        let id = self.id_of(&doc)?;
        self.inner.ids.reserve(&id)?;
        self.write_with_id(&id, &doc)?;
        Ok(doc)
    }

    /// Removes fields from one document. `None` if it does not exist.
    pub fn remove_fields_by_id(&self, id: impl Into<DocumentId>, fields: &[&str]) -> StoreResult<Option<Document>> {
        let id = id.into();
        let updated = self
            .create_query_builder()
            .where_(self.primary_key(), "=", id.to_value())
            .get_query()?
            .remove_fields(fields)?;
        Ok(updated.and_then(|docs| docs.into_iter().next()))
    }

    // ==================== Deletes ====================

    /// Deletes documents matching a JSON condition tree
    pub fn delete_by(&self, criteria: &Value, mode: DeleteReturn) -> StoreResult<DeleteOutcome> {
        self.create_query_builder()
            .where_json(criteria)
            .get_query()?
            .delete(mode)
    }

    /// Deletes one document. `false` if it did not exist.
    pub fn delete_by_id(&self, id: impl Into<DocumentId>) -> StoreResult<bool> {
        let result = self.storage().delete_document(&id.into());
        if let Ok(true) = result {
            log_event_with_fields(Event::DocumentsDeleted, &[("count", "1"), ("store", self.name())]);
        }
        self.finish_write(result)
    }

    /// Removes the whole store: documents, cache and counter
    pub fn delete_store(self) -> StoreResult<()> {
        match &self.inner.root {
            Some(root) => {
                fs::remove_dir_all(root).map_err(|e| {
                    StoreError::io(format!("Failed to delete store {}", root.display()), e)
                })?;
            }
            None => {
                for id in self.storage().list_document_ids()? {
                    self.storage().delete_document(&id)?;
                }
                self.inner.cache.delete_all()?;
            }
        }
        log_event_with_fields(Event::StoreDeleted, &[("store", self.name())]);
        Ok(())
    }
}

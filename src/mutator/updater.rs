//! Update, delete and field removal over a scanned result set
//!
//! Every operation first checks that all targeted documents still exist.
//! If one is gone, nothing is written. After that, writes happen one
//! document at a time without rollback: when one fails, the error lists
//! the primary keys that were already changed.

use serde_json::{json, Value};

use crate::document::{decode_document, encode_document, Document, DocumentId, NestedPath};
use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};
use crate::storage::DocumentStorage;

/// What a delete reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteReturn {
    /// Whether anything was deleted
    #[default]
    Bool,
    /// How many documents were deleted
    Count,
    /// The deleted documents
    Documents,
}

impl DeleteReturn {
    pub fn parse(s: &str) -> StoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "bool" => Ok(DeleteReturn::Bool),
            "count" => Ok(DeleteReturn::Count),
            "documents" => Ok(DeleteReturn::Documents),
            _ => Err(StoreError::invalid_argument(format!(
                "Unknown delete return mode \"{}\"",
                s
            ))),
        }
    }
}

/// Result of a delete, shaped by [`DeleteReturn`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(bool),
    Count(usize),
    Documents(Vec<Document>),
}

impl DeleteOutcome {
    fn empty(mode: DeleteReturn) -> Self {
        Self::from_deleted(mode, Vec::new())
    }

    fn from_deleted(mode: DeleteReturn, deleted: Vec<Document>) -> Self {
        match mode {
            DeleteReturn::Bool => DeleteOutcome::Deleted(!deleted.is_empty()),
            DeleteReturn::Count => DeleteOutcome::Count(deleted.len()),
            DeleteReturn::Documents => DeleteOutcome::Documents(deleted),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DeleteOutcome::Deleted(b) => json!(b),
            DeleteOutcome::Count(n) => json!(n),
            DeleteOutcome::Documents(docs) => {
                Value::Array(docs.iter().cloned().map(Value::Object).collect())
            }
        }
    }
}

/// Applies writes to documents found by a scan
pub struct DocumentUpdater<'a> {
    storage: &'a dyn DocumentStorage,
    primary_key: &'a str,
}

impl<'a> DocumentUpdater<'a> {
    pub fn new(storage: &'a dyn DocumentStorage, primary_key: &'a str) -> Self {
        Self {
            storage,
            primary_key,
        }
    }

    /// Sets each `changes` entry (a dot path) on every document. The
    /// primary key is never changed.
    ///
    /// `None` when there was nothing to update or a document disappeared
    /// before the first write.
    pub fn update(&self, documents: &[Document], changes: &Document) -> StoreResult<Option<Vec<Document>>> {
        let mut assignments = Vec::with_capacity(changes.len());
        for (key, value) in changes {
            let path = NestedPath::parse(key)?;
            if path.root() != self.primary_key {
                assignments.push((path, value.clone()));
            }
        }

        let ids = match self.checked_ids(documents)? {
            Some(ids) => ids,
            None => return Ok(None),
        };

        let updated = self.rewrite(&ids, Event::DocumentsUpdated, |doc| {
            for (path, value) in &assignments {
                path.set(doc, value.clone());
            }
        })?;
        Ok(Some(updated))
    }

    /// Removes fields from every document. The primary key can not be
    /// removed.
    pub fn remove_fields(&self, documents: &[Document], fields: &[String]) -> StoreResult<Option<Vec<Document>>> {
        let mut paths = Vec::with_capacity(fields.len());
        for field in fields {
            let path = NestedPath::parse(field)?;
            if path.root() == self.primary_key {
                return Err(StoreError::invalid_argument(format!(
                    "The primary key \"{}\" can not be removed",
                    self.primary_key
                )));
            }
            paths.push(path);
        }

        let ids = match self.checked_ids(documents)? {
            Some(ids) => ids,
            None => return Ok(None),
        };

        let updated = self.rewrite(&ids, Event::FieldsRemoved, |doc| {
            for path in &paths {
                path.remove(doc);
            }
        })?;
        Ok(Some(updated))
    }

    /// Replaces whole documents, matched by primary key. `false` if any
    /// of them does not exist.
    pub fn replace(&self, documents: &[Document]) -> StoreResult<bool> {
        let ids = match self.checked_ids(documents)? {
            Some(ids) => ids,
            None => return Ok(false),
        };

        let mut completed = Vec::with_capacity(ids.len());
        for (id, doc) in ids.iter().zip(documents) {
            let result = encode_document(doc).and_then(|bytes| self.storage.write_document(id, &bytes));
            if let Err(e) = result {
                return Err(self.abort(e, completed));
            }
            completed.push(id.to_value());
        }

        log_event_with_fields(Event::DocumentsUpdated, &[("count", &completed.len().to_string())]);
        Ok(true)
    }

    /// Deletes every document.
    ///
    /// Fails with `NotFound` before deleting anything if a document is
    /// already gone, and with an I/O error listing the deleted keys if a
    /// delete fails part-way.
    pub fn delete(&self, documents: &[Document], mode: DeleteReturn) -> StoreResult<DeleteOutcome> {
        if documents.is_empty() {
            return Ok(DeleteOutcome::empty(mode));
        }

        let ids = self.ids_of(documents)?;
        let missing = self.missing(&ids)?;
        if !missing.is_empty() {
            return Err(StoreError::not_found(format!(
                "{} document(s) no longer exist, nothing was deleted",
                missing.len()
            ))
            .with_details(join_ids(&missing)));
        }

        let mut completed = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.storage.delete_document(id) {
                Ok(true) => completed.push(id.to_value()),
                Ok(false) => {
                    let e = StoreError::io_no_source(format!("Document {} could not be deleted", id));
                    return Err(self.abort(e, completed));
                }
                Err(e) => return Err(self.abort(e, completed)),
            }
        }

        log_event_with_fields(Event::DocumentsDeleted, &[("count", &completed.len().to_string())]);
        Ok(DeleteOutcome::from_deleted(mode, documents.to_vec()))
    }

    /// Re-reads, edits and writes each document in turn
    fn rewrite(
        &self,
        ids: &[DocumentId],
        event: Event,
        edit: impl Fn(&mut Document),
    ) -> StoreResult<Vec<Document>> {
        let mut completed = Vec::with_capacity(ids.len());
        let mut written = Vec::with_capacity(ids.len());

        for id in ids {
            match self.rewrite_one(id, &edit) {
                Ok(doc) => {
                    completed.push(id.to_value());
                    written.push(doc);
                }
                Err(e) => return Err(self.abort(e, completed)),
            }
        }

        log_event_with_fields(event, &[("count", &written.len().to_string())]);
        Ok(written)
    }

    fn rewrite_one(&self, id: &DocumentId, edit: &impl Fn(&mut Document)) -> StoreResult<Document> {
        let bytes = self
            .storage
            .read_document(id)?
            .ok_or_else(|| StoreError::not_found(format!("Document {} disappeared during the update", id)))?;
        let mut doc = decode_document(&bytes)?;
        let primary = doc.get(self.primary_key).cloned();

        edit(&mut doc);

        // The key stays exactly as stored
        if let Some(primary) = primary {
            doc.insert(self.primary_key.to_string(), primary);
        }
        self.storage.write_document(id, &encode_document(&doc)?)?;
        Ok(doc)
    }

    /// Ids of the documents, or `None` when there are none or one is gone
    fn checked_ids(&self, documents: &[Document]) -> StoreResult<Option<Vec<DocumentId>>> {
        if documents.is_empty() {
            return Ok(None);
        }
        let ids = self.ids_of(documents)?;
        if !self.missing(&ids)?.is_empty() {
            return Ok(None);
        }
        Ok(Some(ids))
    }

    fn ids_of(&self, documents: &[Document]) -> StoreResult<Vec<DocumentId>> {
        documents
            .iter()
            .map(|doc| match doc.get(self.primary_key) {
                Some(value) => DocumentId::from_value(value),
                None => Err(StoreError::invalid_argument(format!(
                    "Document has no primary key \"{}\"",
                    self.primary_key
                ))),
            })
            .collect()
    }

    fn missing(&self, ids: &[DocumentId]) -> StoreResult<Vec<DocumentId>> {
        let mut missing = Vec::new();
        for id in ids {
            if !self.storage.contains_document(id)? {
                missing.push(id.clone());
            }
        }
        Ok(missing)
    }

    fn abort(&self, error: StoreError, completed: Vec<Value>) -> StoreError {
        log_event_with_fields(
            Event::MutationAborted,
            &[
                ("completed", &completed.len().to_string()),
                ("error", error.message()),
            ],
        );
        error.with_completed(completed)
    }
}

fn join_ids(ids: &[DocumentId]) -> String {
    ids.iter().map(DocumentId::to_string).collect::<Vec<_>>().join(", ")
}

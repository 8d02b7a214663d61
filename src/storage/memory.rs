//! In-memory storage, for tests and ephemeral stores

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::backend::DocumentStorage;
use crate::document::DocumentId;
use crate::errors::{StoreError, StoreResult};

/// Document storage held in a map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: RwLock<BTreeMap<DocumentId, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts raw bytes, bypassing any encoding. Lets tests plant
    /// corrupt records.
    pub fn insert_raw(&self, id: DocumentId, bytes: impl Into<Vec<u8>>) -> StoreResult<()> {
        self.documents
            .write()
            .map_err(|_| poisoned())?
            .insert(id, bytes.into());
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::io_no_source("Memory storage lock poisoned")
}

impl DocumentStorage for MemoryStorage {
    fn read_document(&self, id: &DocumentId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.documents.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    fn write_document(&self, id: &DocumentId, bytes: &[u8]) -> StoreResult<()> {
        self.insert_raw(id.clone(), bytes)
    }

    fn delete_document(&self, id: &DocumentId) -> StoreResult<bool> {
        Ok(self
            .documents
            .write()
            .map_err(|_| poisoned())?
            .remove(id)
            .is_some())
    }

    fn list_document_ids(&self) -> StoreResult<Vec<DocumentId>> {
        Ok(self
            .documents
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect())
    }

    fn contains_document(&self, id: &DocumentId) -> StoreResult<bool> {
        Ok(self.documents.read().map_err(|_| poisoned())?.contains_key(id))
    }
}

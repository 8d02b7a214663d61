//! Document store access contract
//!
//! The query core only ever talks to storage through [`DocumentStorage`].
//! Implementations own locking: reads are shared, writes exclusive, and the
//! lock scope is a single document.

use crate::document::DocumentId;
use crate::errors::StoreResult;

/// Per-document read/write/delete
pub trait DocumentStorage: Send + Sync {
    /// Reads a document body. `None` when it does not exist.
    fn read_document(&self, id: &DocumentId) -> StoreResult<Option<Vec<u8>>>;

    /// Writes a document body, replacing any previous content atomically
    fn write_document(&self, id: &DocumentId, bytes: &[u8]) -> StoreResult<()>;

    /// Deletes a document. `false` when it did not exist.
    fn delete_document(&self, id: &DocumentId) -> StoreResult<bool>;

    /// Lists all document ids. The order is unspecified.
    fn list_document_ids(&self) -> StoreResult<Vec<DocumentId>>;

    /// Whether a backing record exists
    fn contains_document(&self, id: &DocumentId) -> StoreResult<bool> {
        Ok(self.read_document(id)?.is_some())
    }
}

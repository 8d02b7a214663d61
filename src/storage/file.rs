//! One-file-per-document storage
//!
//! Layout: `<store>/data/<id>.json`. Files whose stem is not a valid
//! document id are ignored when listing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::backend::DocumentStorage;
use super::locked_io::{delete_locked, read_locked, write_locked};
use crate::document::DocumentId;
use crate::errors::{StoreError, StoreResult};

/// Extension of document files
pub const DOCUMENT_EXTENSION: &str = "json";

/// Filesystem-backed document storage
#[derive(Debug, Clone)]
pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    /// Opens `data_dir`, creating it if needed
    pub fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| {
            StoreError::io(
                format!("Failed to create data directory: {}", data_dir.display()),
                e,
            )
        })?;
        Ok(Self { data_dir })
    }

    /// Directory holding the document files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn document_path(&self, id: &DocumentId) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", id.file_stem(), DOCUMENT_EXTENSION))
    }
}

impl DocumentStorage for FileStorage {
    fn read_document(&self, id: &DocumentId) -> StoreResult<Option<Vec<u8>>> {
        read_locked(&self.document_path(id))
    }

    fn write_document(&self, id: &DocumentId, bytes: &[u8]) -> StoreResult<()> {
        write_locked(&self.document_path(id), bytes)
    }

    fn delete_document(&self, id: &DocumentId) -> StoreResult<bool> {
        delete_locked(&self.document_path(id))
    }

    fn list_document_ids(&self) -> StoreResult<Vec<DocumentId>> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::io(
                    format!("Failed to list {}", self.data_dir.display()),
                    e,
                ))
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                StoreError::io(format!("Failed to list {}", self.data_dir.display()), e)
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(DocumentId::parse)
            {
                ids.push(id);
            }
        }
        // Stable scan order across platforms
        ids.sort();
        Ok(ids)
    }

    fn contains_document(&self, id: &DocumentId) -> StoreResult<bool> {
        Ok(self.document_path(id).is_file())
    }
}

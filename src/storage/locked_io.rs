//! Lock-scoped file access
//!
//! Reads hold a shared lock for the whole read, writes an exclusive lock for
//! the whole write. The lock covers one file only. A write truncates and
//! rewrites the file in one `write_all` while the lock is held, so a
//! concurrent reader sees either the old or the new content.
//!
//! Lock acquisition waits only as long as the OS does; a failure is
//! reported as an I/O error straight away, without retry.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;

use crate::errors::{StoreError, StoreResult};

/// Reads a whole file under a shared lock. `None` if the file is missing.
pub fn read_locked(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::io(
                format!("Failed to open {}", path.display()),
                e,
            ))
        }
    };

    file.lock_shared().map_err(|e| {
        StoreError::io(format!("Failed to acquire read lock on {}", path.display()), e)
    })?;

    let mut bytes = Vec::new();
    let read = file.read_to_end(&mut bytes);
    let _ = file.unlock();

    read.map_err(|e| StoreError::io(format!("Failed to read {}", path.display()), e))?;
    Ok(Some(bytes))
}

/// Replaces a file's content under an exclusive lock, creating it if needed.
pub fn write_locked(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut file = open_for_write(path)?;
    let result = replace_content(&mut file, bytes);
    let _ = file.unlock();
    result.map_err(|e| StoreError::io(format!("Failed to write {}", path.display()), e))
}

/// Read-modify-write under a single exclusive lock.
///
/// `update` receives the current content (`None` for a new or empty file)
/// and returns the replacement.
pub fn update_locked<F>(path: &Path, update: F) -> StoreResult<()>
where
    F: FnOnce(Option<Vec<u8>>) -> StoreResult<Vec<u8>>,
{
    let mut file = open_for_write(path)?;

    let mut current = Vec::new();
    if let Err(e) = file.read_to_end(&mut current) {
        let _ = file.unlock();
        return Err(StoreError::io(format!("Failed to read {}", path.display()), e));
    }
    let current = if current.is_empty() { None } else { Some(current) };

    let result = match update(current) {
        Ok(next) => replace_content(&mut file, &next)
            .map_err(|e| StoreError::io(format!("Failed to write {}", path.display()), e)),
        Err(e) => Err(e),
    };
    let _ = file.unlock();
    result
}

/// Removes a file while holding its exclusive lock. `false` if it was
/// already gone.
pub fn delete_locked(path: &Path) -> StoreResult<bool> {
    let file = match OpenOptions::new().write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(StoreError::io(
                format!("Failed to open {}", path.display()),
                e,
            ))
        }
    };

    file.lock_exclusive().map_err(|e| {
        StoreError::io(format!("Failed to acquire write lock on {}", path.display()), e)
    })?;

    let removed = match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(
            format!("Failed to delete {}", path.display()),
            e,
        )),
    };
    let _ = file.unlock();
    removed
}

fn open_for_write(path: &Path) -> StoreResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(format!("Failed to open {}", path.display()), e))?;

    file.lock_exclusive().map_err(|e| {
        StoreError::io(format!("Failed to acquire write lock on {}", path.display()), e)
    })?;
    Ok(file)
}

fn replace_content(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_locked(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn test_write_replaces_whole_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_locked(&path, b"a much longer first body").unwrap();
        write_locked(&path, b"short").unwrap();
        assert_eq!(read_locked(&path).unwrap().unwrap(), b"short");
    }

    #[test]
    fn test_update_sees_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter");
        update_locked(&path, |current| {
            assert!(current.is_none());
            Ok(b"1".to_vec())
        })
        .unwrap();
        update_locked(&path, |current| {
            assert_eq!(current.unwrap(), b"1");
            Ok(b"2".to_vec())
        })
        .unwrap();
        assert_eq!(read_locked(&path).unwrap().unwrap(), b"2");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_locked(&path, b"{}").unwrap();
        assert!(delete_locked(&path).unwrap());
        assert!(!delete_locked(&path).unwrap());
    }
}

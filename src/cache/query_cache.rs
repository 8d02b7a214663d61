//! File-backed query result cache
//!
//! Each entry is one file, `<token>.<lifetime>.json`, holding the result
//! array. Entry files go through the same locked read/write path as
//! documents. Expiry is judged from the file's modification time and an
//! expired entry is removed by the read that finds it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::Value;

use super::lifetime::Lifetime;
use super::token::CacheToken;
use crate::document::{into_document, Document};
use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};
use crate::storage::locked_io::{delete_locked, read_locked, write_locked};

/// Extension of cache entry files
pub const CACHE_EXTENSION: &str = "json";

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    token: CacheToken,
    lifetime: Lifetime,
}

/// A store's cache namespace
#[derive(Debug, Clone)]
pub struct QueryCache {
    dir: PathBuf,
}

impl QueryCache {
    /// Opens the cache directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::io(format!("Failed to create cache directory: {}", dir.display()), e)
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the cached result for `token`, if a fresh entry exists.
    ///
    /// Expired entries are deleted and reported as a miss. So is an entry
    /// whose payload no longer decodes.
    pub fn get(&self, token: &CacheToken) -> StoreResult<Option<Vec<Document>>> {
        for entry in self.entries()? {
            if entry.token != *token {
                continue;
            }

            if entry.lifetime.is_expired(age_of(&entry.path)) {
                delete_locked(&entry.path)?;
                log_event_with_fields(
                    Event::CacheExpired,
                    &[("token", token.as_str()), ("lifetime", &entry.lifetime.marker())],
                );
                continue;
            }

            let bytes = match read_locked(&entry.path)? {
                Some(bytes) => bytes,
                None => continue,
            };
            match decode_payload(&bytes) {
                Ok(documents) => {
                    log_event_with_fields(Event::CacheHit, &[("token", token.as_str())]);
                    return Ok(Some(documents));
                }
                Err(e) => {
                    delete_locked(&entry.path)?;
                    log_event_with_fields(
                        Event::CacheInvalidated,
                        &[("token", token.as_str()), ("reason", e.message())],
                    );
                }
            }
        }

        log_event_with_fields(Event::CacheMiss, &[("token", token.as_str())]);
        Ok(None)
    }

    /// Stores a result, replacing any entry for the same token
    pub fn set(&self, token: &CacheToken, documents: &[Document], lifetime: Lifetime) -> StoreResult<()> {
        self.delete(token)?;

        let payload = Value::Array(documents.iter().cloned().map(Value::Object).collect());
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| StoreError::serialization("Failed to encode cache entry", e))?;
        write_locked(&self.entry_path(token, lifetime), &bytes)?;

        log_event_with_fields(
            Event::CacheStored,
            &[
                ("token", token.as_str()),
                ("lifetime", &lifetime.marker()),
                ("rows", &documents.len().to_string()),
            ],
        );
        Ok(())
    }

    /// Deletes every entry for `token`. Missing entries are fine.
    pub fn delete(&self, token: &CacheToken) -> StoreResult<()> {
        self.delete_where(|entry| entry.token == *token).map(|_| ())
    }

    /// Deletes every entry in the store's cache
    pub fn delete_all(&self) -> StoreResult<usize> {
        let removed = self.delete_where(|_| true)?;
        if removed > 0 {
            log_event_with_fields(
                Event::CacheInvalidated,
                &[("entries", &removed.to_string()), ("scope", "all")],
            );
        }
        Ok(removed)
    }

    /// Deletes every entry stored without a lifetime. Called after writes.
    pub fn delete_all_with_no_lifetime(&self) -> StoreResult<usize> {
        let removed = self.delete_where(|entry| entry.lifetime.purged_on_write())?;
        if removed > 0 {
            log_event_with_fields(
                Event::CacheInvalidated,
                &[("entries", &removed.to_string()), ("scope", "no_lifetime")],
            );
        }
        Ok(removed)
    }

    /// Number of entry files currently present, expired or not
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn entry_path(&self, token: &CacheToken, lifetime: Lifetime) -> PathBuf {
        self.dir
            .join(format!("{}.{}.{}", token, lifetime.marker(), CACHE_EXTENSION))
    }

    fn delete_where(&self, wanted: impl Fn(&CacheEntry) -> bool) -> StoreResult<usize> {
        let mut removed = 0;
        for entry in self.entries()? {
            if wanted(&entry) && delete_locked(&entry.path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Entry files, recognised purely by name
    fn entries(&self) -> StoreResult<Vec<CacheEntry>> {
        let listing = match fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::io(
                    format!("Failed to list cache {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        for item in listing {
            let item = item.map_err(|e| {
                StoreError::io(format!("Failed to list cache {}", self.dir.display()), e)
            })?;
            let path = item.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if let Some((token, lifetime)) = parse_entry_name(name) {
                entries.push(CacheEntry {
                    path,
                    token,
                    lifetime,
                });
            }
        }
        Ok(entries)
    }
}

fn parse_entry_name(name: &str) -> Option<(CacheToken, Lifetime)> {
    let mut parts = name.split('.');
    let token = CacheToken::parse(parts.next()?)?;
    let lifetime = Lifetime::parse_marker(parts.next()?)?;
    if parts.next()? != CACHE_EXTENSION || parts.next().is_some() {
        return None;
    }
    Some((token, lifetime))
}

fn age_of(path: &Path) -> Duration {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or(Duration::ZERO)
}

fn decode_payload(bytes: &[u8]) -> StoreResult<Vec<Document>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::serialization("Cache entry is not valid JSON", e))?;
    match value {
        Value::Array(items) => items.into_iter().map(into_document).collect(),
        _ => Err(StoreError::not_a_document("Cache entry is not an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn docs() -> Vec<Document> {
        vec![
            json!({"_id": 1, "name": "a"}).as_object().unwrap().clone(),
            json!({"_id": 2, "name": "b"}).as_object().unwrap().clone(),
        ]
    }

    fn token(n: u64) -> CacheToken {
        CacheToken::from_json(&json!({ "q": n }))
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("cache")).unwrap();
        let t = token(1);

        assert!(cache.get(&t).unwrap().is_none());
        cache.set(&t, &docs(), Lifetime::NoLifetime).unwrap();
        assert_eq!(cache.get(&t).unwrap().unwrap(), docs());
    }

    #[test]
    fn test_file_name_encodes_lifetime() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path()).unwrap();
        let t = token(1);

        cache.set(&t, &docs(), Lifetime::Seconds(30)).unwrap();
        assert!(dir.path().join(format!("{}.30.json", t)).is_file());

        // Re-setting with another lifetime replaces the old file
        cache.set(&t, &docs(), Lifetime::NoLifetime).unwrap();
        assert!(!dir.path().join(format!("{}.30.json", t)).exists());
        assert!(dir.path().join(format!("{}.no_lifetime.json", t)).is_file());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_delete_all_with_no_lifetime_keeps_timed_entries() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path()).unwrap();

        cache.set(&token(1), &docs(), Lifetime::NoLifetime).unwrap();
        cache.set(&token(2), &docs(), Lifetime::Seconds(0)).unwrap();
        cache.set(&token(3), &docs(), Lifetime::Seconds(600)).unwrap();

        assert_eq!(cache.delete_all_with_no_lifetime().unwrap(), 1);
        assert_eq!(cache.delete_all_with_no_lifetime().unwrap(), 0);
        assert!(cache.get(&token(1)).unwrap().is_none());
        assert!(cache.get(&token(2)).unwrap().is_some());
        assert!(cache.get(&token(3)).unwrap().is_some());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path()).unwrap();
        cache.delete(&token(9)).unwrap();
        cache.set(&token(9), &docs(), Lifetime::NoLifetime).unwrap();
        cache.delete(&token(9)).unwrap();
        cache.delete(&token(9)).unwrap();
        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.delete_all().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path()).unwrap();
        let t = token(4);
        fs::write(dir.path().join(format!("{}.no_lifetime.json", t)), b"{oops").unwrap();

        assert!(cache.get(&t).unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path()).unwrap();
        fs::write(dir.path().join("README"), b"x").unwrap();
        fs::write(dir.path().join("abc.later.json"), b"[]").unwrap();
        assert_eq!(cache.delete_all().unwrap(), 0);
        assert!(dir.path().join("README").exists());
    }
}

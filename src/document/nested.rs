//! Dot-path addressing over documents
//!
//! A path such as `address.city` walks nested maps one segment at a time.
//! Reads may also step into arrays with a numeric segment (`tags.0`);
//! writes only ever create or descend into maps.

use serde_json::{Map, Value};

use super::Document;
use crate::errors::{StoreError, StoreResult};

/// A parsed, non-empty dot path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedPath {
    raw: String,
    segments: Vec<String>,
}

impl NestedPath {
    /// Parses a dot path. Fails only when the path is empty.
    pub fn parse(path: &str) -> StoreResult<Self> {
        if path.is_empty() {
            return Err(StoreError::invalid_argument("Field path can not be empty"));
        }
        Ok(Self {
            raw: path.to_string(),
            segments: path.split('.').map(str::to_string).collect(),
        })
    }

    /// Returns the path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the individual segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the first segment (the top-level key)
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Returns true for a single-segment path
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// Resolves the path. `None` means absent, which is distinct from a
    /// present `null`.
    pub fn get<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = doc.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Resolves the path, mapping absent to `null`
    pub fn get_or_null(&self, doc: &Document) -> Value {
        self.get(doc).cloned().unwrap_or(Value::Null)
    }

    /// True when every segment resolves, even if the leaf is `null`
    pub fn exists(&self, doc: &Document) -> bool {
        self.get(doc).is_some()
    }

    /// Writes `value` at the path, creating intermediate maps. A non-map
    /// value sitting on an intermediate segment is replaced by a map.
    pub fn set(&self, doc: &mut Document, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };
        let mut current = doc;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.clone(), value);
    }

    /// Removes the leaf if the whole path resolves. Missing intermediates
    /// are a no-op.
    pub fn remove(&self, doc: &mut Document) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = doc;
        for segment in parents {
            current = match current.get_mut(segment)? {
                Value::Object(map) => map,
                _ => return None,
            };
        }
        current.remove(last)
    }
}

impl std::fmt::Display for NestedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Reads a dot path from a document
pub fn get<'a>(path: &str, doc: &'a Document) -> StoreResult<Option<&'a Value>> {
    Ok(NestedPath::parse(path)?.get(doc))
}

/// Presence test for a dot path
pub fn exists(path: &str, doc: &Document) -> StoreResult<bool> {
    Ok(NestedPath::parse(path)?.exists(doc))
}

/// Writes a value at a dot path
pub fn set(path: &str, doc: &mut Document, value: Value) -> StoreResult<()> {
    NestedPath::parse(path)?.set(doc, value);
    Ok(())
}

/// Removes the value at a dot path
pub fn remove(path: &str, doc: &mut Document) -> StoreResult<Option<Value>> {
    Ok(NestedPath::parse(path)?.remove(doc))
}

//! Primary key values
//!
//! A document id is either a counter integer or a v4 UUID. The same value
//! names the document's backing file, so parsing a file stem back into an
//! id also rejects anything that could escape the store directory.

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{StoreError, StoreResult};

/// Store-unique document identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentId {
    /// Sequential id issued by a counter
    Counter(u64),
    /// Random id
    Uuid(Uuid),
}

impl DocumentId {
    /// Returns the JSON value stored in the primary-key field
    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Counter(n) => Value::from(*n),
            DocumentId::Uuid(u) => Value::String(u.to_string()),
        }
    }

    /// Reads an id back from a primary-key field value
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(DocumentId::Counter).ok_or_else(|| {
                StoreError::invalid_argument(format!(
                    "Primary key must be a positive integer or UUID, got {}",
                    n
                ))
            }),
            Value::String(s) => Self::parse(s).ok_or_else(|| {
                StoreError::invalid_argument(format!("Invalid primary key \"{}\"", s))
            }),
            other => Err(StoreError::invalid_argument(format!(
                "Invalid primary key {}",
                other
            ))),
        }
    }

    /// Parses a file stem or textual id
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(n) = s.parse::<u64>() {
            return Some(DocumentId::Counter(n));
        }
        Uuid::parse_str(s).ok().map(DocumentId::Uuid)
    }

    /// Name of the backing file, without extension
    pub fn file_stem(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Counter(n) => write!(f, "{}", n),
            DocumentId::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl From<u64> for DocumentId {
    fn from(n: u64) -> Self {
        DocumentId::Counter(n)
    }
}

impl From<Uuid> for DocumentId {
    fn from(u: Uuid) -> Self {
        DocumentId::Uuid(u)
    }
}

//! Document model
//!
//! A document is a string-keyed map of JSON values. Exactly one field, the
//! primary key (`_id` unless configured otherwise), is assigned by the store
//! at creation and never changes afterwards.

mod id;
pub mod nested;

pub use id::DocumentId;
pub use nested::NestedPath;

use serde_json::{Map, Value};

use crate::errors::{StoreError, StoreResult};

/// A stored record
pub type Document = Map<String, Value>;

/// Default primary key field name
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

/// Decodes a stored body into a document
pub fn decode_document(bytes: &[u8]) -> StoreResult<Document> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::not_a_document(format!(
            "Expected a JSON object, found {}",
            json_type_name(&other)
        ))),
    }
}

/// Encodes a document for storage
pub fn encode_document(doc: &Document) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(doc)?)
}

/// Converts an arbitrary value into a document
pub fn into_document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::invalid_argument(format!(
            "A document has to be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Human-readable JSON type name used in error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

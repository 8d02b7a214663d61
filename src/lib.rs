//! shelfdb - embedded, file-backed JSON document store
//!
//! Each store is a directory of independent JSON documents addressed by a
//! generated primary key. Queries are built fluently, run as a scan over
//! every document, and may be cached on disk under a fingerprint of the
//! query.
//!
//! ```ignore
//! use serde_json::json;
//! use shelfdb::{Store, StoreConfig};
//!
//! let store = Store::open("./db", "users", StoreConfig::default())?;
//! store.insert(json!({"name": "Ann", "age": 31}))?;
//! let adults = store
//!     .create_query_builder()
//!     .where_("age", ">=", 18)
//!     .order_by("name", "asc")
//!     .get_query()?
//!     .fetch()?;
//! ```

pub mod cache;
pub mod cli;
pub mod condition;
pub mod config;
pub mod document;
pub mod errors;
pub mod finder;
pub mod mutator;
pub mod observability;
pub mod query;
pub mod reducer;
pub mod storage;
pub mod store;

pub use config::{IdStrategy, SearchOptions, StoreConfig};
pub use document::{Document, DocumentId};
pub use errors::{StoreError, StoreErrorCode, StoreResult};
pub use query::{Query, QueryBuilder};
pub use store::Store;

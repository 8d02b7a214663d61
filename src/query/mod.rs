//! Query façade
//!
//! [`QueryBuilder`] accumulates a [`QueryConfig`]; [`Query`] runs it,
//! through the cache for reads and through the mutator for writes.

mod builder;
mod config;
#[allow(clippy::module_inception)]
mod query;
mod request;

pub use builder::QueryBuilder;
pub use config::{CachePolicy, QueryConfig, ResultShape, SearchSpec};
pub use query::Query;
pub use request::{GroupByRequest, OrderByRequest, QueryRequest, SearchRequest};

//! JSON query requests
//!
//! A whole query as one JSON object, for callers that cannot chain builder
//! methods (the CLI reads these from stdin):
//!
//! ```json
//! {
//!   "where": [["age", ">", 18], "or", ["vip", "=", true]],
//!   "orderBy": [{"field": "age", "direction": "desc"}],
//!   "select": ["name", {"as": "years", "field": "age"}],
//!   "limit": 10
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::builder::QueryBuilder;
use crate::errors::StoreResult;
use crate::finder::{SearchAlgorithm, SearchMode};
use crate::reducer::SelectField;

/// One order-by key
#[derive(Debug, Clone, Deserialize)]
pub struct OrderByRequest {
    pub field: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "asc".to_string()
}

/// Search settings; unset options fall back to the store's defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub fields: Vec<String>,
    pub query: String,
    pub mode: Option<String>,
    pub algorithm: Option<String>,
    pub min_length: Option<usize>,
    pub score_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByRequest {
    pub fields: Vec<String>,
    pub count_key: Option<String>,
    #[serde(default)]
    pub allow_empty: bool,
}

/// A query decoded from JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryRequest {
    #[serde(rename = "where")]
    pub where_: Option<Value>,
    /// Each entry is one or-branch
    #[serde(default)]
    pub or_where: Vec<Value>,
    pub having: Option<Value>,
    #[serde(default)]
    pub distinct: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderByRequest>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<SearchRequest>,
    pub group_by: Option<GroupByRequest>,
    #[serde(default)]
    pub select: Vec<Value>,
    #[serde(default)]
    pub except: Vec<String>,
    pub use_cache: Option<bool>,
    pub cache_lifetime: Option<u64>,
    #[serde(default)]
    pub regenerate_cache: bool,
}

impl QueryRequest {
    pub fn from_json(value: Value) -> StoreResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Feeds every setting into `builder`. Errors surface from
    /// [`QueryBuilder::get_query`].
    pub fn apply(self, mut builder: QueryBuilder) -> QueryBuilder {
        if let Some(tree) = &self.where_ {
            builder = builder.where_json(tree);
        }
        for tree in &self.or_where {
            builder = builder.or_where_json(tree);
        }
        if let Some(tree) = &self.having {
            builder = builder.having_json(tree);
        }

        if !self.distinct.is_empty() {
            let fields: Vec<&str> = self.distinct.iter().map(String::as_str).collect();
            builder = builder.distinct(&fields);
        }
        for order in &self.order_by {
            builder = builder.order_by(&order.field, &order.direction);
        }
        if let Some(skip) = self.skip {
            builder = builder.skip(skip);
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }

        if let Some(search) = self.search {
            builder = apply_search(builder, search);
        }
        if let Some(group) = &self.group_by {
            let fields: Vec<&str> = group.fields.iter().map(String::as_str).collect();
            builder = builder.group_by(&fields, group.count_key.as_deref(), group.allow_empty);
        }

        let select: StoreResult<Vec<SelectField>> =
            self.select.iter().map(SelectField::from_json).collect();
        builder = match select {
            Ok(fields) if !fields.is_empty() => builder.select(fields),
            Ok(_) => builder,
            Err(e) => builder.fail(e),
        };
        if !self.except.is_empty() {
            let fields: Vec<&str> = self.except.iter().map(String::as_str).collect();
            builder = builder.except(&fields);
        }

        match self.use_cache {
            Some(false) => builder = builder.disable_cache(),
            Some(true) => builder = builder.use_cache(self.cache_lifetime),
            None if self.cache_lifetime.is_some() => builder = builder.use_cache(self.cache_lifetime),
            None => {}
        }
        if self.regenerate_cache {
            builder = builder.regenerate_cache();
        }
        builder
    }
}

fn apply_search(builder: QueryBuilder, search: SearchRequest) -> QueryBuilder {
    let mut options = builder.store_search_defaults();
    if let Some(mode) = &search.mode {
        match SearchMode::parse(mode) {
            Ok(mode) => options.mode = mode,
            Err(e) => return builder.fail(e),
        }
    }
    if let Some(algorithm) = &search.algorithm {
        match SearchAlgorithm::parse(algorithm) {
            Ok(algorithm) => options.algorithm = algorithm,
            Err(e) => return builder.fail(e),
        }
    }
    if let Some(min_length) = search.min_length {
        options.min_length = min_length;
    }
    if search.score_key.is_some() {
        options.score_key = search.score_key;
    }
    let fields: Vec<&str> = search.fields.iter().map(String::as_str).collect();
    builder.search_with(&fields, &search.query, options)
}

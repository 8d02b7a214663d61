//! Query configuration
//!
//! Everything a query needs to run, accumulated by the builder. The cache
//! fingerprint covers every field except the cache policy.

use serde_json::{json, Value};

use crate::cache::{CacheToken, Lifetime};
use crate::condition::ConditionNode;
use crate::config::{SearchOptions, StoreConfig};
use crate::finder::OrderBy;
use crate::reducer::{GroupBySpec, JoinSpec, SelectField};

/// Full-text search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpec {
    /// Fields to search, most important first
    pub fields: Vec<String>,
    /// Raw query string
    pub query: String,
    pub options: SearchOptions,
}

impl SearchSpec {
    pub fn to_json(&self) -> Value {
        json!({
            "fields": self.fields,
            "query": self.query,
            "mode": self.options.mode.as_str(),
            "algorithm": self.options.algorithm.as_str(),
            "minLength": self.options.min_length,
            "scoreKey": self.options.score_key,
        })
    }
}

/// Per-query cache settings. Unset fields fall back to the store config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: Option<bool>,
    pub lifetime: Option<Lifetime>,
    /// Drop the cached entry before reading
    pub regenerate: bool,
}

impl CachePolicy {
    /// Effective (enabled, lifetime) for a store
    pub fn resolve(&self, store: &StoreConfig) -> (bool, Lifetime) {
        (
            self.enabled.unwrap_or(store.auto_cache),
            self.lifetime.unwrap_or_else(|| store.default_lifetime()),
        )
    }
}

/// Whether a read asks for one document or many. Part of the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Many,
    Single,
}

/// Accumulated query settings
#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// Root condition group; adjacent nodes are and-ed
    pub conditions: Vec<ConditionNode>,
    /// Conditions applied after grouping and selection
    pub having: Vec<ConditionNode>,
    pub distinct: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<SearchSpec>,
    pub group_by: Option<GroupBySpec>,
    pub select: Vec<SelectField>,
    pub except: Vec<String>,
    pub joins: Vec<JoinSpec>,
    pub cache: CachePolicy,
}

impl QueryConfig {
    /// Canonical description of everything that shapes the result
    pub fn shape_json(&self) -> Value {
        json!({
            "where": self.conditions.iter().map(ConditionNode::to_json).collect::<Vec<_>>(),
            "having": self.having.iter().map(ConditionNode::to_json).collect::<Vec<_>>(),
            "distinct": self.distinct,
            "orderBy": self.order_by.iter().map(OrderBy::to_json).collect::<Vec<_>>(),
            "skip": self.skip,
            "limit": self.limit,
            "search": self.search.as_ref().map(SearchSpec::to_json),
            "groupBy": self.group_by.as_ref().map(GroupBySpec::to_json),
            "select": self.select.iter().map(SelectField::to_json).collect::<Vec<_>>(),
            "except": self.except,
            "joins": self.joins.iter().map(|j| j.target().to_string()).collect::<Vec<_>>(),
        })
    }

    /// Cache token for this configuration
    pub fn token(&self, shape: ResultShape) -> CacheToken {
        CacheToken::from_json(&json!({
            "query": self.shape_json(),
            "single": shape == ResultShape::Single,
        }))
    }

    /// Whether the select list reduces all rows into one
    pub fn has_reducing_select(&self) -> bool {
        self.select.iter().any(SelectField::is_reducing)
    }
}

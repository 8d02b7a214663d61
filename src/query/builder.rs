//! Fluent query builder
//!
//! Builder methods consume and return the builder. A bad argument does not
//! panic or return early: the first error is kept and reported by
//! [`QueryBuilder::get_query`], so a chain can be written without `?` on
//! every step.

use serde_json::Value;

use super::config::{QueryConfig, SearchSpec};
use super::query::Query;
use crate::cache::Lifetime;
use crate::condition::{BoolJoin, Condition, ConditionNode, Operand};
use crate::config::SearchOptions;
use crate::document::Document;
use crate::errors::{StoreError, StoreResult};
use crate::finder::OrderBy;
use crate::reducer::{GroupBySpec, JoinSource, JoinSpec, SelectField};
use crate::store::Store;

/// Accumulates a query against one store
pub struct QueryBuilder {
    store: Store,
    config: QueryConfig,
    keep_conditions: bool,
    error: Option<StoreError>,
}

impl QueryBuilder {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            config: QueryConfig::default(),
            keep_conditions: false,
            error: None,
        }
    }

    /// Settings accumulated so far
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Records the first error of the chain
    pub(crate) fn fail(mut self, error: StoreError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    fn add_condition(mut self, join: BoolJoin, node: StoreResult<ConditionNode>, having: bool) -> Self {
        let node = match node {
            Ok(node) => node,
            Err(e) => return self.fail(e),
        };
        let target = if having {
            &mut self.config.having
        } else {
            &mut self.config.conditions
        };
        // An or with nothing before it is a plain where
        if !target.is_empty() {
            target.push(ConditionNode::Join(join));
        }
        target.push(node);
        self
    }

    // ==================== Conditions ====================

    /// Adds `field operator value`, and-ed with what is already there
    pub fn where_(self, field: &str, operator: &str, value: impl Into<Operand>) -> Self {
        let node = ConditionNode::leaf(field, operator, value);
        self.add_condition(BoolJoin::And, node, false)
    }

    /// Adds a prebuilt node, and-ed
    pub fn where_node(self, node: ConditionNode) -> Self {
        let node = node.validate().map(|_| node);
        self.add_condition(BoolJoin::And, node, false)
    }

    /// Adds several conditions as one and-ed group
    pub fn where_all(self, nodes: Vec<ConditionNode>) -> Self {
        self.add_condition(BoolJoin::And, ConditionNode::group(nodes), false)
    }

    /// Adds a condition tree decoded from JSON, and-ed
    pub fn where_json(self, tree: &Value) -> Self {
        self.add_condition(BoolJoin::And, ConditionNode::from_json(tree), false)
    }

    /// Adds a labelled predicate over the whole document, and-ed
    pub fn where_fn(
        self,
        label: impl Into<String>,
        func: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.add_condition(BoolJoin::And, Ok(ConditionNode::predicate(label, func)), false)
    }

    /// Adds `field operator value` as an or-branch
    pub fn or_where(self, field: &str, operator: &str, value: impl Into<Operand>) -> Self {
        let node = ConditionNode::leaf(field, operator, value);
        self.add_condition(BoolJoin::Or, node, false)
    }

    /// Adds a prebuilt node as an or-branch
    pub fn or_where_node(self, node: ConditionNode) -> Self {
        let node = node.validate().map(|_| node);
        self.add_condition(BoolJoin::Or, node, false)
    }

    /// Adds several conditions, and-ed together, as one or-branch
    pub fn or_where_all(self, nodes: Vec<ConditionNode>) -> Self {
        self.add_condition(BoolJoin::Or, ConditionNode::group(nodes), false)
    }

    /// Adds a JSON condition tree as an or-branch
    pub fn or_where_json(self, tree: &Value) -> Self {
        self.add_condition(BoolJoin::Or, ConditionNode::from_json(tree), false)
    }

    /// `field in [values]`
    pub fn in_<V: Into<Operand>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let operand = Operand::list(values.into_iter().map(Into::into));
        let node = Condition::new(field, "in", operand).map(ConditionNode::Leaf);
        self.add_condition(BoolJoin::And, node, false)
    }

    /// `field not in [values]`
    pub fn not_in<V: Into<Operand>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let operand = Operand::list(values.into_iter().map(Into::into));
        let node = Condition::new(field, "not in", operand).map(ConditionNode::Leaf);
        self.add_condition(BoolJoin::And, node, false)
    }

    // ==================== Shaping ====================

    pub fn skip(mut self, skip: usize) -> Self {
        self.config.skip = Some(skip);
        self
    }

    /// Caps the number of rows. Zero is rejected.
    pub fn limit(mut self, limit: usize) -> Self {
        if limit == 0 {
            return self.fail(StoreError::invalid_argument("Limit has to be greater than 0"));
        }
        self.config.limit = Some(limit);
        self
    }

    /// Appends a sort key; `direction` is `asc` or `desc`
    pub fn order_by(self, field: &str, direction: &str) -> Self {
        match OrderBy::parse(field, direction) {
            Ok(order) => self.order_by_key(order),
            Err(e) => self.fail(e),
        }
    }

    pub fn order_by_key(mut self, order: OrderBy) -> Self {
        self.config.order_by.push(order);
        self
    }

    /// Searches the given fields using the store's search defaults
    pub fn search(self, fields: &[&str], query: &str) -> Self {
        let options = self.store_search_defaults();
        self.search_with(fields, query, options)
    }

    pub(crate) fn store_search_defaults(&self) -> SearchOptions {
        self.store.config().search.clone()
    }

    /// Searches with explicit options
    pub fn search_with(mut self, fields: &[&str], query: &str, options: SearchOptions) -> Self {
        if fields.is_empty() {
            return self.fail(StoreError::invalid_argument(
                "Search needs at least one field to search in",
            ));
        }
        self.config.search = Some(SearchSpec {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            query: query.to_string(),
            options,
        });
        self
    }

    /// Keeps only the first accepted document per combination of values
    pub fn distinct(mut self, fields: &[&str]) -> Self {
        self.config
            .distinct
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Groups rows by `fields`. `count_key` names the per-group row count.
    pub fn group_by(mut self, fields: &[&str], count_key: Option<&str>, allow_empty: bool) -> Self {
        if fields.is_empty() {
            return self.fail(StoreError::invalid_argument(
                "Group by needs at least one field",
            ));
        }
        let mut spec = GroupBySpec::new(fields.iter().map(|f| f.to_string()).collect())
            .allow_empty(allow_empty);
        if let Some(key) = count_key {
            spec = spec.with_count_key(key);
        }
        self.config.group_by = Some(spec);
        self
    }

    /// Filters rows after grouping and selection
    pub fn having(self, field: &str, operator: &str, value: impl Into<Operand>) -> Self {
        let node = ConditionNode::leaf(field, operator, value);
        self.add_condition(BoolJoin::And, node, true)
    }

    pub fn having_node(self, node: ConditionNode) -> Self {
        let node = node.validate().map(|_| node);
        self.add_condition(BoolJoin::And, node, true)
    }

    pub fn having_json(self, tree: &Value) -> Self {
        self.add_condition(BoolJoin::And, ConditionNode::from_json(tree), true)
    }

    /// Adds fields to the select list. The primary key is always kept.
    pub fn select<S: Into<SelectField>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.config.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Removes fields from every row
    pub fn except(mut self, fields: &[&str]) -> Self {
        self.config
            .except
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Attaches the documents `producer` returns under `target`
    pub fn join(
        mut self,
        target: &str,
        producer: impl Fn(&Document) -> StoreResult<JoinSource> + Send + Sync + 'static,
    ) -> Self {
        self.config.joins.push(JoinSpec::new(target, producer));
        self
    }

    // ==================== Cache ====================

    /// Caches results; `None` keeps them until the next write
    pub fn use_cache(mut self, lifetime: Option<u64>) -> Self {
        self.config.cache.enabled = Some(true);
        self.config.cache.lifetime = Some(Lifetime::from_seconds(lifetime));
        self
    }

    pub fn disable_cache(mut self) -> Self {
        self.config.cache.enabled = Some(false);
        self
    }

    /// Recomputes and re-caches the result even if a cached one exists
    pub fn regenerate_cache(mut self) -> Self {
        self.config.cache.regenerate = true;
        self
    }

    /// Keeps where and having conditions when the query is taken
    pub fn keep_conditions(mut self, keep: bool) -> Self {
        self.keep_conditions = keep;
        self
    }

    // ==================== Output ====================

    /// Snapshot of the current settings
    pub fn get_query(&self) -> StoreResult<Query> {
        if let Some(error) = &self.error {
            return Err(error.detached());
        }
        Ok(Query::new(self.store.clone(), self.config.clone()))
    }

    /// Snapshot, then clears the conditions unless asked to keep them, so
    /// the builder can be reused
    pub fn take_query(&mut self) -> StoreResult<Query> {
        let query = self.get_query()?;
        if !self.keep_conditions {
            self.config.conditions.clear();
            self.config.having.clear();
        }
        Ok(query)
    }
}

//! Group-by and aggregation
//!
//! Documents are bucketed by the SHA-256 of their group key values. A
//! document with a null group value is dropped unless empty groups are
//! allowed. Buckets keep first-seen order and are finalized once, after
//! every document has been folded in.

use std::collections::HashMap;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::aggregate::Accumulator;
use super::select::SelectField;
use crate::document::{Document, NestedPath};
use crate::errors::{StoreError, StoreResult};

/// Group-by settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBySpec {
    /// Fields forming the group key
    pub fields: Vec<String>,
    /// Output field holding the number of rows per group
    pub count_key: Option<String>,
    /// Keep documents whose group values are null
    pub allow_empty: bool,
}

impl GroupBySpec {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            count_key: None,
            allow_empty: false,
        }
    }

    pub fn with_count_key(mut self, key: impl Into<String>) -> Self {
        self.count_key = Some(key.into());
        self
    }

    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "fields": self.fields,
            "countKey": self.count_key,
            "allowEmpty": self.allow_empty,
        })
    }

    /// Output pattern: the select list, else group fields plus count key
    fn pattern(&self, select: &[SelectField]) -> Vec<SelectField> {
        if !select.is_empty() {
            return select.to_vec();
        }
        let mut pattern: Vec<SelectField> = self.fields.iter().cloned().map(SelectField::field).collect();
        if let Some(key) = &self.count_key {
            pattern.push(SelectField::field(key.clone()));
        }
        pattern
    }

    /// Every entry must name a group field, the count key or an aggregate
    fn validate_pattern(&self, pattern: &[SelectField]) -> StoreResult<()> {
        if self.fields.is_empty() {
            return Err(StoreError::invalid_argument(
                "Group by needs at least one field",
            ));
        }
        for field in pattern {
            match field {
                SelectField::Field { path, .. } => {
                    let known = self.fields.iter().any(|f| f == path)
                        || self.count_key.as_deref() == Some(path.as_str());
                    if !known {
                        return Err(StoreError::invalid_argument(format!(
                            "Field \"{}\" is neither grouped, the count key nor an aggregate",
                            path
                        )));
                    }
                }
                SelectField::Function { function, .. } if !function.is_reducing() => {
                    return Err(StoreError::invalid_argument(format!(
                        "Only sum, min, max and avg can be used with group by, got {}",
                        function
                    )));
                }
                SelectField::Function { .. } => {}
            }
        }
        Ok(())
    }
}

/// Output slot of a grouped row
enum Slot {
    GroupValue { index: usize, path: NestedPath, alias: Option<String> },
    Count { name: String },
    Aggregate { name: String, position: usize },
}

struct Bucket {
    key: Vec<Value>,
    rows: usize,
    accumulators: Vec<Accumulator>,
}

/// Groups documents and computes the selected aggregates
pub fn group_by(
    documents: Vec<Document>,
    spec: &GroupBySpec,
    select: &[SelectField],
) -> StoreResult<Vec<Document>> {
    let pattern = spec.pattern(select);
    spec.validate_pattern(&pattern)?;

    let key_paths = spec
        .fields
        .iter()
        .map(|f| NestedPath::parse(f))
        .collect::<StoreResult<Vec<_>>>()?;

    let mut slots = Vec::with_capacity(pattern.len());
    let mut template = Vec::new();
    for field in &pattern {
        match field {
            SelectField::Field { path, alias } => {
                match spec.fields.iter().position(|f| f == path) {
                    Some(index) => slots.push(Slot::GroupValue {
                        index,
                        path: NestedPath::parse(path)?,
                        alias: alias.clone(),
                    }),
                    None => slots.push(Slot::Count {
                        name: field.output_name(),
                    }),
                }
            }
            SelectField::Function { function, path, .. } => {
                slots.push(Slot::Aggregate {
                    name: field.output_name(),
                    position: template.len(),
                });
                template.push(Accumulator::new(*function, NestedPath::parse(path)?));
            }
        }
    }

    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in &documents {
        let key: Vec<Value> = key_paths.iter().map(|p| p.get_or_null(doc)).collect();
        if !spec.allow_empty && key.iter().any(Value::is_null) {
            continue;
        }

        let hash = group_hash(&key);
        let slot = match index.get(&hash) {
            Some(&i) => i,
            None => {
                buckets.push(Bucket {
                    key,
                    rows: 0,
                    accumulators: template.clone(),
                });
                index.insert(hash, buckets.len() - 1);
                buckets.len() - 1
            }
        };

        let bucket = &mut buckets[slot];
        bucket.rows += 1;
        for acc in bucket.accumulators.iter_mut() {
            acc.add(doc);
        }
    }

    Ok(buckets
        .into_iter()
        .map(|bucket| {
            let mut row = Document::new();
            for slot in &slots {
                match slot {
                    Slot::GroupValue { index, path, alias } => {
                        let value = bucket.key[*index].clone();
                        match alias {
                            Some(alias) => {
                                row.insert(alias.clone(), value);
                            }
                            None => path.set(&mut row, value),
                        }
                    }
                    Slot::Count { name } => {
                        row.insert(name.clone(), Value::from(bucket.rows));
                    }
                    Slot::Aggregate { name, position } => {
                        row.insert(name.clone(), bucket.accumulators[*position].finish());
                    }
                }
            }
            row
        })
        .collect())
}

fn group_hash(key: &[Value]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Value::Array(key.to_vec()).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

//! Field selection and exclusion
//!
//! A select list projects each document onto the named fields. The primary
//! key is always kept. An alias puts the value under a new top-level name;
//! without one, a nested path keeps its nesting in the output.
//!
//! A select list made only of aggregates (and no group-by) reduces the
//! whole result into a single row.

use serde_json::{Map, Value};

use super::aggregate::{Accumulator, SelectFunction};
use crate::document::{Document, NestedPath};
use crate::errors::{StoreError, StoreResult};

/// Key used in select objects for the output name
pub const ALIAS_KEY: &str = "as";

/// One entry of a select list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectField {
    /// Copy a field, optionally under another name
    Field { path: String, alias: Option<String> },
    /// Apply a function to a field
    Function {
        function: SelectFunction,
        path: String,
        alias: Option<String>,
    },
}

impl SelectField {
    pub fn field(path: impl Into<String>) -> Self {
        SelectField::Field {
            path: path.into(),
            alias: None,
        }
    }

    /// `alias => path`
    pub fn aliased(alias: impl Into<String>, path: impl Into<String>) -> Self {
        SelectField::Field {
            path: path.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn function(function: SelectFunction, path: impl Into<String>) -> Self {
        SelectField::Function {
            function,
            path: path.into(),
            alias: None,
        }
    }

    /// Sets the output name
    pub fn alias(self, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match self {
            SelectField::Field { path, .. } => SelectField::Field { path, alias: name },
            SelectField::Function { function, path, .. } => SelectField::Function {
                function,
                path,
                alias: name,
            },
        }
    }

    /// Source field path
    pub fn path(&self) -> &str {
        match self {
            SelectField::Field { path, .. } | SelectField::Function { path, .. } => path,
        }
    }

    /// Name the value appears under. Unaliased functions are named
    /// `function(path)`.
    pub fn output_name(&self) -> String {
        match self {
            SelectField::Field { alias: Some(a), .. }
            | SelectField::Function { alias: Some(a), .. } => a.clone(),
            SelectField::Field { path, alias: None } => path.clone(),
            SelectField::Function {
                function,
                path,
                alias: None,
            } => format!("{}({})", function, path),
        }
    }

    pub fn is_reducing(&self) -> bool {
        matches!(self, SelectField::Function { function, .. } if function.is_reducing())
    }

    /// Decodes `"path"`, `{"field": "path", "as": "alias"}` or
    /// `{"sum": "path", "as": "alias"}`
    pub fn from_json(value: &Value) -> StoreResult<Self> {
        let map = match value {
            Value::String(path) => return Ok(SelectField::field(path.clone())),
            Value::Object(map) => map,
            other => {
                return Err(StoreError::invalid_argument(format!(
                    "Select entries must be strings or objects, got {}",
                    other
                )))
            }
        };

        let alias = match map.get(ALIAS_KEY) {
            None => None,
            Some(Value::String(a)) => Some(a.clone()),
            Some(other) => {
                return Err(StoreError::invalid_argument(format!(
                    "Select alias must be a string, got {}",
                    other
                )))
            }
        };

        let mut rest = map.iter().filter(|(k, _)| k.as_str() != ALIAS_KEY);
        let (key, source) = match (rest.next(), rest.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(StoreError::invalid_argument(format!(
                    "Select object needs exactly one source entry besides \"{}\": {}",
                    ALIAS_KEY, value
                )))
            }
        };
        let path = match source {
            Value::String(p) => p.clone(),
            other => {
                return Err(StoreError::invalid_argument(format!(
                    "Select source for \"{}\" must be a field path, got {}",
                    key, other
                )))
            }
        };

        let field = if key == "field" {
            SelectField::field(path)
        } else {
            SelectField::function(SelectFunction::parse(key)?, path)
        };
        Ok(match alias {
            Some(a) => field.alias(a),
            None => field,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        match self {
            SelectField::Field { path, alias } => {
                if alias.is_none() {
                    return Value::String(path.clone());
                }
                map.insert("field".to_string(), Value::String(path.clone()));
            }
            SelectField::Function { function, path, .. } => {
                map.insert(function.as_str().to_string(), Value::String(path.clone()));
            }
        }
        if let SelectField::Field { alias: Some(a), .. } | SelectField::Function { alias: Some(a), .. } = self {
            map.insert(ALIAS_KEY.to_string(), Value::String(a.clone()));
        }
        Value::Object(map)
    }
}

impl From<&str> for SelectField {
    fn from(path: &str) -> Self {
        SelectField::field(path)
    }
}

impl From<String> for SelectField {
    fn from(path: String) -> Self {
        SelectField::field(path)
    }
}

/// Applies a select list without group-by
pub fn select(
    documents: Vec<Document>,
    fields: &[SelectField],
    primary_key: &str,
) -> StoreResult<Vec<Document>> {
    if fields.is_empty() {
        return Ok(documents);
    }

    let reducing = fields.iter().filter(|f| f.is_reducing()).count();
    if reducing > 0 {
        if fields
            .iter()
            .any(|f| matches!(f, SelectField::Function { .. }) && !f.is_reducing())
        {
            return Err(StoreError::invalid_argument(
                "Mixing reducing and non-reducing functions in one select is not allowed",
            ));
        }
        if reducing != fields.len() {
            return Err(StoreError::invalid_argument(
                "Plain fields can not be selected next to aggregates without a group by",
            ));
        }
        return reduce_all(documents, fields);
    }

    let compiled = fields
        .iter()
        .map(|f| -> StoreResult<(NestedPath, &SelectField)> { Ok((NestedPath::parse(f.path())?, f)) })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(documents
        .into_iter()
        .map(|doc| project(&doc, &compiled, primary_key))
        .collect())
}

fn project(doc: &Document, fields: &[(NestedPath, &SelectField)], primary_key: &str) -> Document {
    let mut out = Document::new();
    if let Some(id) = doc.get(primary_key) {
        out.insert(primary_key.to_string(), id.clone());
    }

    for (path, field) in fields {
        match field {
            SelectField::Field { alias: None, .. } => {
                if let Some(value) = path.get(doc) {
                    path.set(&mut out, value.clone());
                }
            }
            SelectField::Field { alias: Some(alias), .. } => {
                if let Some(value) = path.get(doc) {
                    out.insert(alias.clone(), value.clone());
                }
            }
            SelectField::Function { function, .. } => {
                out.insert(field.output_name(), function.apply_scalar(path.get(doc)));
            }
        }
    }
    out
}

fn reduce_all(documents: Vec<Document>, fields: &[SelectField]) -> StoreResult<Vec<Document>> {
    if documents.is_empty() {
        return Ok(documents);
    }

    let mut accumulators = Vec::with_capacity(fields.len());
    for field in fields {
        if let SelectField::Function { function, path, .. } = field {
            accumulators.push((field.output_name(), Accumulator::new(*function, NestedPath::parse(path)?)));
        }
    }
    for doc in &documents {
        for (_, acc) in accumulators.iter_mut() {
            acc.add(doc);
        }
    }

    let mut row = Document::new();
    for (name, acc) in accumulators {
        row.insert(name, acc.finish());
    }
    Ok(vec![row])
}

/// Removes the given fields. Nested paths only remove the leaf.
pub fn except(mut documents: Vec<Document>, fields: &[String]) -> StoreResult<Vec<Document>> {
    if fields.is_empty() {
        return Ok(documents);
    }
    let paths = fields
        .iter()
        .map(|f| NestedPath::parse(f))
        .collect::<StoreResult<Vec<_>>>()?;

    for doc in documents.iter_mut() {
        for path in &paths {
            path.remove(doc);
        }
    }
    Ok(documents)
}

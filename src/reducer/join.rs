//! Join expansion
//!
//! A join runs a caller-supplied function for each document and attaches
//! what it returns under the join's target field. The function either
//! hands back finished documents or a query builder, which is fetched
//! here. Recursion depth is not limited; avoiding cycles is up to the
//! caller.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::document::Document;
use crate::errors::StoreResult;
use crate::query::QueryBuilder;

/// What a join function returns
pub enum JoinSource {
    /// Ready-made child documents
    Documents(Vec<Document>),
    /// A sub-query to run
    Query(QueryBuilder),
}

impl From<Vec<Document>> for JoinSource {
    fn from(documents: Vec<Document>) -> Self {
        JoinSource::Documents(documents)
    }
}

impl From<QueryBuilder> for JoinSource {
    fn from(builder: QueryBuilder) -> Self {
        JoinSource::Query(builder)
    }
}

type JoinFn = dyn Fn(&Document) -> StoreResult<JoinSource> + Send + Sync;

/// A registered join
#[derive(Clone)]
pub struct JoinSpec {
    target: String,
    producer: Arc<JoinFn>,
}

impl JoinSpec {
    pub fn new(
        target: impl Into<String>,
        producer: impl Fn(&Document) -> StoreResult<JoinSource> + Send + Sync + 'static,
    ) -> Self {
        Self {
            target: target.into(),
            producer: Arc::new(producer),
        }
    }

    /// Field the children are attached under
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Child documents for one parent
    pub fn resolve(&self, parent: &Document) -> StoreResult<Vec<Document>> {
        match (self.producer)(parent)? {
            JoinSource::Documents(documents) => Ok(documents),
            JoinSource::Query(builder) => builder.get_query()?.fetch_as_join(),
        }
    }
}

impl fmt::Debug for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinSpec").field("target", &self.target).finish()
    }
}

/// Attaches every join's children to every document
pub fn join(mut documents: Vec<Document>, joins: &[JoinSpec]) -> StoreResult<Vec<Document>> {
    for doc in documents.iter_mut() {
        for spec in joins {
            let children = spec.resolve(doc)?;
            doc.insert(
                spec.target.clone(),
                Value::Array(children.into_iter().map(Value::Object).collect()),
            );
        }
    }
    Ok(documents)
}

//! CLI command implementations

use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::document::Document;
use crate::mutator::DeleteReturn;
use crate::observability::{Logger, Severity};
use crate::query::{Query, QueryRequest};
use crate::store::Store;

use super::args::{Cli, Command, StoreArgs};
use super::errors::{CliError, CliResult};
use super::io::{read_request, read_request_or, write_error, write_response};

/// Parses arguments, runs the command and reports errors on stdout
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let level = Severity::parse(&cli.log_level)
        .ok_or_else(|| CliError::usage(format!("Unknown log level \"{}\"", cli.log_level)))?;
    Logger::set_min_severity(level);

    match run_command(cli.command) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code(), &e.message())?;
            Err(e)
        }
    }
}

/// Runs one command and returns the response payload
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Insert { target } => insert(&open_store(&target)?, read_request()?),
        Command::Query {
            target,
            first,
            count,
        } => {
            let store = open_store(&target)?;
            let query = build_query(&store, read_request_or(json!({}))?)?;
            if count {
                Ok(json!(query.count()?))
            } else if first {
                Ok(query.first()?.map(Value::Object).unwrap_or(Value::Null))
            } else {
                Ok(documents_json(query.fetch()?))
            }
        }
        Command::Delete { target, returning } => {
            let mode = DeleteReturn::parse(&returning)?;
            let store = open_store(&target)?;
            let query = build_query(&store, read_request()?)?;
            Ok(query.delete(mode)?.to_json())
        }
        Command::ClearCache { target } => {
            let store = open_store(&target)?;
            let removed = store.cache().delete_all()?;
            Ok(json!({ "removed": removed }))
        }
    }
}

fn open_store(target: &StoreArgs) -> CliResult<Store> {
    let config = match &target.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    Ok(Store::open(&target.db, &target.store, config)?)
}

fn build_query(store: &Store, request: Value) -> CliResult<Query> {
    let request = QueryRequest::from_json(request)?;
    Ok(request.apply(store.create_query_builder()).get_query()?)
}

/// Inserts an object, or every object of an array
pub fn insert(store: &Store, input: Value) -> CliResult<Value> {
    match input {
        Value::Array(items) => Ok(documents_json(store.insert_many(items)?)),
        Value::Object(_) => Ok(Value::Object(store.insert(input)?)),
        _ => Err(CliError::usage(
            "insert expects a JSON object or an array of objects",
        )),
    }
}

fn documents_json(documents: Vec<Document>) -> Value {
    Value::Array(documents.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Store {
        Store::open(dir.path(), "cli", StoreConfig::with_counter_ids()).unwrap()
    }

    #[test]
    fn test_insert_object_and_array() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let one = insert(&s, json!({"a": 1})).unwrap();
        assert_eq!(one["_id"], json!(1));
        let many = insert(&s, json!([{"a": 2}, {"a": 3}])).unwrap();
        assert_eq!(many.as_array().unwrap().len(), 2);
        assert!(insert(&s, json!(5)).is_err());
    }

    #[test]
    fn test_build_query_from_request() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        insert(&s, json!([{"a": 1}, {"a": 2}, {"a": 3}])).unwrap();

        let query = build_query(&s, json!({"where": ["a", ">=", 2], "orderBy": [{"field": "a", "direction": "desc"}]})).unwrap();
        let rows = query.fetch().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["a"], json!(3));
    }

    #[test]
    fn test_build_query_reports_store_errors() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let err = build_query(&s, json!({"limit": 0})).err().unwrap();
        assert_eq!(err.code(), "SHELF_INVALID_ARGUMENT");
    }
}

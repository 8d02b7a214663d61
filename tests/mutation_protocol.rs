//! Mutation Protocol Tests
//!
//! - Inserted documents read back with exactly one added primary key
//! - The primary key never changes
//! - A missing document aborts the batch before any write
//! - A failure mid-batch reports what was already applied
//! - Corrupt documents are skipped by scans, not fatal

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{json, Value};
use shelfdb::document::{into_document, DocumentId};
use shelfdb::mutator::{DeleteOutcome, DeleteReturn, DocumentUpdater};
use shelfdb::storage::{DocumentStorage, MemoryStorage};
use shelfdb::store::DATA_DIR;
use shelfdb::{Document, Store, StoreConfig, StoreErrorCode, StoreResult};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn counter_store(dir: &TempDir) -> Store {
    Store::open(dir.path(), "mut", StoreConfig::with_counter_ids()).unwrap()
}

/// Memory storage that fails deletes of one id once armed
struct FailingDeletes {
    inner: MemoryStorage,
    fail_on: DocumentId,
    armed: AtomicBool,
}

impl DocumentStorage for FailingDeletes {
    fn read_document(&self, id: &DocumentId) -> StoreResult<Option<Vec<u8>>> {
        self.inner.read_document(id)
    }

    fn write_document(&self, id: &DocumentId, bytes: &[u8]) -> StoreResult<()> {
        self.inner.write_document(id, bytes)
    }

    fn delete_document(&self, id: &DocumentId) -> StoreResult<bool> {
        if self.armed.load(Ordering::SeqCst) && *id == self.fail_on {
            return Ok(false);
        }
        self.inner.delete_document(id)
    }

    fn list_document_ids(&self) -> StoreResult<Vec<DocumentId>> {
        self.inner.list_document_ids()
    }
}

// =============================================================================
// Round Trip And Primary Key
// =============================================================================

#[test]
fn test_insert_round_trip_adds_only_primary_key() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    let input = json!({
        "title": "Dune",
        "rating": 4.5,
        "tags": ["sf", "classic"],
        "author": {"name": "Herbert", "born": 1920},
        "missing": null
    });

    let inserted = store.insert(input.clone()).unwrap();
    let read = store.find_by_id(1u64).unwrap().unwrap();
    assert_eq!(inserted, read);

    let mut expected = into_document(input).unwrap();
    expected.insert("_id".to_string(), json!(1));
    assert_eq!(read, expected);
}

#[test]
fn test_primary_key_is_immutable() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    store.insert(json!({"a": 1})).unwrap();

    let q = store.create_query_builder().get_query().unwrap();
    assert!(q.update(json!({"_id": 77, "a": 2})).unwrap());
    let doc = store.find_by_id(1u64).unwrap().unwrap();
    assert_eq!(doc["_id"], json!(1));
    assert_eq!(doc["a"], json!(2));
    assert!(store.find_by_id(77u64).unwrap().is_none());

    let err = q.remove_fields(&["_id"]).unwrap_err();
    assert_eq!(err.code(), StoreErrorCode::InvalidArgument);
}

#[test]
fn test_ids_are_not_reused_after_delete() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    store.insert(json!({"a": 1})).unwrap();
    store.insert(json!({"a": 2})).unwrap();
    store.delete_by_id(2u64).unwrap();

    let reopened = counter_store(&dir);
    let doc = reopened.insert(json!({"a": 3})).unwrap();
    assert_eq!(doc["_id"], json!(3));
}

// =============================================================================
// Pre-checks
// =============================================================================

#[test]
fn test_delete_precheck_aborts_whole_batch() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    let docs = store
        .insert_many(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})])
        .unwrap();

    // Document 2 disappears between the scan and the delete
    store.storage().delete_document(&DocumentId::Counter(2)).unwrap();

    let updater = DocumentUpdater::new(store.storage(), "_id");
    let err = updater.delete(&docs, DeleteReturn::Count).unwrap_err();
    assert_eq!(err.code(), StoreErrorCode::NotFound);
    assert!(err.completed().is_empty());
    assert!(store.find_by_id(1u64).unwrap().is_some());
    assert!(store.find_by_id(3u64).unwrap().is_some());
}

#[test]
fn test_update_precheck_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    let docs = store
        .insert_many(vec![json!({"a": 1}), json!({"a": 2})])
        .unwrap();
    store.storage().delete_document(&DocumentId::Counter(2)).unwrap();

    let updater = DocumentUpdater::new(store.storage(), "_id");
    let changes: Document = into_document(json!({"a": 100})).unwrap();
    assert!(updater.update(&docs, &changes).unwrap().is_none());
    assert_eq!(store.find_by_id(1u64).unwrap().unwrap()["a"], json!(1));
}

// =============================================================================
// Partial Failure
// =============================================================================

#[test]
fn test_mid_batch_delete_failure_reports_completed_ids() {
    let flaky = FailingDeletes {
        inner: MemoryStorage::new(),
        fail_on: DocumentId::Counter(3),
        armed: AtomicBool::new(false),
    };
    let docs: Vec<Document> = (1..=4u64)
        .map(|n| into_document(json!({"_id": n, "n": n})).unwrap())
        .collect();
    for doc in &docs {
        let id = DocumentId::from_value(&doc["_id"]).unwrap();
        flaky
            .write_document(&id, &serde_json::to_vec(&Value::Object(doc.clone())).unwrap())
            .unwrap();
    }
    flaky.armed.store(true, Ordering::SeqCst);

    let updater = DocumentUpdater::new(&flaky, "_id");
    let err = updater.delete(&docs, DeleteReturn::Documents).unwrap_err();
    assert_eq!(err.code(), StoreErrorCode::Io);
    assert_eq!(err.completed(), &[json!(1), json!(2)]);

    // Nothing is rolled back
    assert!(flaky.read_document(&DocumentId::Counter(1)).unwrap().is_none());
    assert!(flaky.read_document(&DocumentId::Counter(3)).unwrap().is_some());
    assert!(flaky.read_document(&DocumentId::Counter(4)).unwrap().is_some());
}

// =============================================================================
// Delete Return Modes
// =============================================================================

#[test]
fn test_delete_return_modes() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    store
        .insert_many((1..=6).map(|n| json!({ "n": n })).collect())
        .unwrap();

    let outcome = store.delete_by(&json!(["n", "<=", 2]), DeleteReturn::Bool).unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted(true));

    let outcome = store.delete_by(&json!(["n", "<=", 4]), DeleteReturn::Count).unwrap();
    assert_eq!(outcome, DeleteOutcome::Count(2));

    match store.delete_by(&json!(["n", ">", 4]), DeleteReturn::Documents).unwrap() {
        DeleteOutcome::Documents(docs) => assert_eq!(docs.len(), 2),
        other => panic!("unexpected outcome {:?}", other),
    }

    let outcome = store.delete_by(&json!(["n", ">", 0]), DeleteReturn::Count).unwrap();
    assert_eq!(outcome, DeleteOutcome::Count(0));
}

// =============================================================================
// Corrupt Documents
// =============================================================================

#[test]
fn test_writes_respect_ungrouped_having() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    store
        .insert_many(vec![
            json!({ "name": "a", "age": 10 }),
            json!({ "name": "b", "age": 20 }),
            json!({ "name": "c", "age": 40 }),
        ])
        .unwrap();

    let query = store
        .create_query_builder()
        .having("age", ">", 30)
        .get_query()
        .unwrap();
    assert_eq!(query.fetch().unwrap().len(), 1);

    assert!(query.update(json!({ "senior": true })).unwrap());
    let seniors = store
        .find_by(&json!(["senior", "=", true]), &[], None, None)
        .unwrap();
    assert_eq!(seniors.len(), 1);
    assert_eq!(seniors[0]["name"], "c");

    let outcome = query.delete(DeleteReturn::Count).unwrap();
    assert_eq!(outcome, DeleteOutcome::Count(1));
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_corrupt_document_is_skipped_by_scans() {
    let dir = TempDir::new().unwrap();
    let store = counter_store(&dir);
    store
        .insert_many(vec![json!({"a": 1}), json!({"a": 2})])
        .unwrap();

    let data_dir = dir.path().join("mut").join(DATA_DIR);
    fs::write(data_dir.join("3.json"), b"{not json").unwrap();
    fs::write(data_dir.join("4.json"), b"[1, 2]").unwrap();
    fs::write(data_dir.join("5.json"), br#"{"a": 5}"#).unwrap();

    let rows = store.find_all(&[], None, None).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(store.count().unwrap(), 2);
    assert!(store.find_by_id(3u64).is_err());
}

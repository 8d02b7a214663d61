//! Observable store events
//!
//! Events are explicit and typed. Each maps to a fixed severity.

use std::fmt;

use super::logger::{Logger, Severity};

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Store directory opened or created
    StoreOpened,
    /// Store directory removed
    StoreDeleted,

    // Reads
    /// Query pipeline ran against storage
    QueryExecuted,
    /// Result served from the cache
    CacheHit,
    /// No usable cache entry
    CacheMiss,
    /// Result written to the cache
    CacheStored,
    /// Cache entry older than its lifetime was removed
    CacheExpired,
    /// Cache entries removed after a write or on request
    CacheInvalidated,
    /// Unreadable document skipped during a scan
    DocumentSkipped,

    // Writes
    /// New document written
    DocumentInserted,
    /// Documents updated
    DocumentsUpdated,
    /// Documents deleted
    DocumentsDeleted,
    /// Fields removed from documents
    FieldsRemoved,
    /// Write stopped part-way through a batch
    MutationAborted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreDeleted => "STORE_DELETED",

            Event::QueryExecuted => "QUERY_COMPLETE",
            Event::CacheHit => "CACHE_HIT",
            Event::CacheMiss => "CACHE_MISS",
            Event::CacheStored => "CACHE_STORED",
            Event::CacheExpired => "CACHE_EXPIRED",
            Event::CacheInvalidated => "CACHE_INVALIDATED",
            Event::DocumentSkipped => "DOCUMENT_SKIPPED",

            Event::DocumentInserted => "DOCUMENT_INSERTED",
            Event::DocumentsUpdated => "DOCUMENTS_UPDATED",
            Event::DocumentsDeleted => "DOCUMENTS_DELETED",
            Event::FieldsRemoved => "FIELDS_REMOVED",
            Event::MutationAborted => "MUTATION_ABORTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::DocumentSkipped => Severity::Warn,
            Event::MutationAborted => Severity::Error,
            Event::QueryExecuted
            | Event::CacheHit
            | Event::CacheMiss
            | Event::CacheStored
            | Event::CacheExpired => Severity::Trace,
            _ => Severity::Info,
        }
    }

    /// Logs the event with the given fields
    pub fn emit(&self, fields: &[(&str, &str)]) {
        Logger::log(self.severity(), self.as_str(), fields);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

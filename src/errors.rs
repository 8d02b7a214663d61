//! Store error types
//!
//! Error codes:
//! - SHELF_INVALID_ARGUMENT (REJECT)
//! - SHELF_CONFIGURATION_ERROR (REJECT)
//! - SHELF_IO_ERROR (ERROR)
//! - SHELF_SERIALIZATION_ERROR (ERROR)
//! - SHELF_NOT_FOUND (ERROR)
//!
//! Caller mistakes (malformed paths, malformed condition trees, unsupported
//! operators) are rejected immediately and are never worth retrying.
//! Environment failures carry the underlying source error.

use std::fmt;
use std::io;

use serde_json::Value;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request itself is wrong; retrying cannot help
    Reject,
    /// The environment or stored data failed the operation
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Store error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Malformed field path, condition tree or operand shape
    InvalidArgument,
    /// Unsupported operator, aggregate function or order direction
    Configuration,
    /// Permission, missing file, lock or write failure
    Io,
    /// Stored or supplied body is not valid structured data
    Serialization,
    /// A document required by a mutation does not exist
    NotFound,
}

impl StoreErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::InvalidArgument => "SHELF_INVALID_ARGUMENT",
            StoreErrorCode::Configuration => "SHELF_CONFIGURATION_ERROR",
            StoreErrorCode::Io => "SHELF_IO_ERROR",
            StoreErrorCode::Serialization => "SHELF_SERIALIZATION_ERROR",
            StoreErrorCode::NotFound => "SHELF_NOT_FOUND",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::InvalidArgument | StoreErrorCode::Configuration => Severity::Reject,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error with full context
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    /// Primary keys already mutated before a batch aborted
    completed: Vec<Value>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StoreError {
    fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            completed: Vec::new(),
            source: None,
        }
    }

    /// Malformed field path, condition tree or operand
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::InvalidArgument, message)
    }

    /// Unsupported operator, function or direction
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Configuration, message)
    }

    /// I/O failure with the underlying error attached
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        let mut err = Self::new(StoreErrorCode::Io, message);
        err.source = Some(Box::new(source));
        err
    }

    /// I/O failure without an underlying error
    pub fn io_no_source(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Io, message)
    }

    /// Body could not be encoded or decoded
    pub fn serialization(message: impl Into<String>, source: serde_json::Error) -> Self {
        let mut err = Self::new(StoreErrorCode::Serialization, message);
        err.source = Some(Box::new(source));
        err
    }

    /// Body decoded but is not a document (e.g. a JSON array)
    pub fn not_a_document(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Serialization, message)
    }

    /// A document required by a mutation is missing
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::NotFound, message)
    }

    /// Attaches free-form context
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Records the primary keys that were mutated before the failure
    pub fn with_completed(mut self, completed: Vec<Value>) -> Self {
        self.completed = completed;
        self
    }

    /// Copy of this error without its source, for errors that are held
    /// and reported more than once
    pub fn detached(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            completed: self.completed.clone(),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Primary keys already mutated when a batch aborted
    pub fn completed(&self) -> &[Value] {
        &self.completed
    }

    /// Returns whether the caller caused this error
    pub fn is_rejection(&self) -> bool {
        self.severity() == Severity::Reject
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if !self.completed.is_empty() {
            let ids: Vec<String> = self.completed.iter().map(|v| v.to_string()).collect();
            write!(f, " [already applied to: {}]", ids.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::io(e.to_string(), e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string(), e)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::errors::StoreError;

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by the `shelfdb` binary
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad command-line or stdin input
    #[error("{0}")]
    Usage(String),

    /// Reading stdin or writing stdout failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stdin was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store rejected or failed the operation
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        CliError::Usage(msg.into())
    }

    /// Stable error code written to stdout
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Usage(_) => "SHELF_CLI_USAGE_ERROR",
            CliError::Io(_) => "SHELF_CLI_IO_ERROR",
            CliError::Json(_) => "SHELF_CLI_JSON_ERROR",
            CliError::Store(e) => e.code().code(),
        }
    }

    /// Message without the code prefix
    pub fn message(&self) -> String {
        match self {
            CliError::Store(e) => match e.details() {
                Some(details) => format!("{} ({})", e.message(), details),
                None => e.message().to_string(),
            },
            other => other.to_string(),
        }
    }
}

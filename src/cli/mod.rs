//! Command-line interface for shelfdb
//!
//! - insert: store documents read from stdin
//! - query: run a JSON query request
//! - delete: delete what a JSON query request matches
//! - clear-cache: drop a store's cached results

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, StoreArgs};
pub use commands::{insert, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};

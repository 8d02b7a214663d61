//! shelfdb CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Responses, including
//! errors, are written to stdout as JSON; the error is repeated on stderr
//! and the process exits non-zero.

use shelfdb::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

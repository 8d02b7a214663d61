//! CLI argument definitions using clap
//!
//! Commands:
//! - shelfdb insert --db <root> --store <name>
//! - shelfdb query --db <root> --store <name> [--first | --count]
//! - shelfdb delete --db <root> --store <name> [--return bool|count|documents]
//! - shelfdb clear-cache --db <root> --store <name>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// shelfdb - file-backed JSON document store
#[derive(Parser, Debug)]
#[command(name = "shelfdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum log severity written to stderr (trace, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Which store to open
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory holding the stores
    #[arg(long, default_value = "./shelfdb")]
    pub db: PathBuf,

    /// Store name
    #[arg(long)]
    pub store: String,

    /// Path to a store configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert the document or array of documents read from stdin
    Insert {
        #[command(flatten)]
        target: StoreArgs,
    },

    /// Run the query request read from stdin
    Query {
        #[command(flatten)]
        target: StoreArgs,

        /// Return only the first row
        #[arg(long, conflicts_with = "count")]
        first: bool,

        /// Return only the number of rows
        #[arg(long)]
        count: bool,
    },

    /// Delete the documents matched by the query request read from stdin
    Delete {
        #[command(flatten)]
        target: StoreArgs,

        /// What to report: bool, count or documents
        #[arg(long = "return", default_value = "bool")]
        returning: String,
    },

    /// Remove every cache entry of a store
    ClearCache {
        #[command(flatten)]
        target: StoreArgs,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

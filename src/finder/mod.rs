//! Document finder
//!
//! Scans a store's documents and turns them into query results: filtering,
//! distinct, search ranking, then the reducer stages and ordering.

mod pipeline;
mod search;
mod sorter;

pub use pipeline::{DocumentFinder, ScanOptions};
pub use search::{SearchAlgorithm, SearchMode, SearchScorer, PRIORITY_MULTIPLIER};
pub use sorter::{DocumentSorter, OrderBy, SortDirection};

//! Store handle
//!
//! A store is a named directory of documents with its own cache namespace:
//!
//! ```text
//! <db_root>/<name>/
//!     data/<id>.json      one file per document
//!     cache/<token>.<lifetime|no_lifetime>.json
//!     _cnt.sdb            last issued counter id
//! ```
//!
//! Every write, successful or not, drops the no-lifetime cache entries so
//! that unbounded cached results never outlive the data they were computed
//! from.

mod handle;

pub use handle::{Store, CACHE_DIR, DATA_DIR};

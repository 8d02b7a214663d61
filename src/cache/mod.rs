//! Query cache
//!
//! Maps a query fingerprint to a previously computed result array.
//!
//! # Entry lifecycle
//!
//! - MISS: the caller computes the result and calls [`QueryCache::set`]
//! - HIT-FRESH: an entry within its lifetime, or one without expiry, is served
//! - HIT-EXPIRED: the read deletes the entry and reports a miss
//!
//! Every write to a store purges its no-lifetime entries. Entries with a
//! finite lifetime may serve stale rows until they expire.

mod lifetime;
mod query_cache;
mod token;

pub use lifetime::{Lifetime, NO_LIFETIME_MARKER};
pub use query_cache::{QueryCache, CACHE_EXTENSION};
pub use token::CacheToken;

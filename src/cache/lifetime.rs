//! Cache entry lifetimes
//!
//! The lifetime is encoded in the entry's file name, so it can be recovered
//! without opening the file. `Seconds(0)` never expires, same as
//! `NoLifetime`, but only `NoLifetime` entries are purged by writes.

use std::fmt;
use std::time::Duration;

/// File name marker for entries without a lifetime
pub const NO_LIFETIME_MARKER: &str = "no_lifetime";

/// How long a cache entry stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Valid until the next write to the store
    NoLifetime,
    /// Valid for this many seconds after it was written; 0 means forever
    Seconds(u64),
}

impl Lifetime {
    /// `None` maps to [`Lifetime::NoLifetime`]
    pub fn from_seconds(seconds: Option<u64>) -> Self {
        match seconds {
            Some(n) => Lifetime::Seconds(n),
            None => Lifetime::NoLifetime,
        }
    }

    /// Marker used in the entry file name
    pub fn marker(&self) -> String {
        match self {
            Lifetime::NoLifetime => NO_LIFETIME_MARKER.to_string(),
            Lifetime::Seconds(n) => n.to_string(),
        }
    }

    /// Parses a file name marker
    pub fn parse_marker(marker: &str) -> Option<Self> {
        if marker == NO_LIFETIME_MARKER {
            return Some(Lifetime::NoLifetime);
        }
        marker.parse::<u64>().ok().map(Lifetime::Seconds)
    }

    /// Whether an entry of this age must no longer be served
    pub fn is_expired(&self, age: Duration) -> bool {
        match self {
            Lifetime::NoLifetime | Lifetime::Seconds(0) => false,
            Lifetime::Seconds(n) => age > Duration::from_secs(*n),
        }
    }

    /// Whether writes to the store purge entries with this lifetime
    pub fn purged_on_write(&self) -> bool {
        matches!(self, Lifetime::NoLifetime)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

//! Primary key generation
//!
//! Ids only need to be unique within a store for its lifetime; they do not
//! have to be monotonic. UUIDs are the default. The counter generator
//! persists the last issued integer in `<store>/_cnt.sdb` and updates it
//! under an exclusive lock, so concurrent processes never draw the same
//! number and deleted ids are never reissued.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use super::locked_io::{read_locked, update_locked};
use crate::document::DocumentId;
use crate::errors::{StoreError, StoreResult};

/// File name of the persisted counter
pub const COUNTER_FILE: &str = "_cnt.sdb";

/// Capability to issue fresh primary keys
pub trait IdGenerator: Send + Sync {
    /// Issues an id never handed out before in this store
    fn next_id(&self) -> StoreResult<DocumentId>;

    /// Records an id chosen by the caller so it is never issued again
    fn reserve(&self, _id: &DocumentId) -> StoreResult<()> {
        Ok(())
    }
}

/// Random v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> StoreResult<DocumentId> {
        Ok(DocumentId::Uuid(Uuid::new_v4()))
    }
}

#[derive(Debug)]
enum CounterBacking {
    File(PathBuf),
    Memory(AtomicU64),
}

/// Sequential integer ids starting at 1
#[derive(Debug)]
pub struct CounterIdGenerator {
    backing: CounterBacking,
}

impl CounterIdGenerator {
    /// Counter persisted in the given file
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: CounterBacking::File(path.into()),
        }
    }

    /// Counter living only as long as this value
    pub fn in_memory() -> Self {
        Self {
            backing: CounterBacking::Memory(AtomicU64::new(0)),
        }
    }

    /// Last issued value, 0 if none
    pub fn current(&self) -> StoreResult<u64> {
        match &self.backing {
            CounterBacking::Memory(counter) => Ok(counter.load(Ordering::SeqCst)),
            CounterBacking::File(path) => match read_locked(path)? {
                Some(bytes) => parse_counter(&bytes),
                None => Ok(0),
            },
        }
    }

    fn advance(&self, next: impl Fn(u64) -> u64) -> StoreResult<u64> {
        match &self.backing {
            CounterBacking::Memory(counter) => {
                let mut current = counter.load(Ordering::SeqCst);
                loop {
                    let wanted = next(current);
                    match counter.compare_exchange(current, wanted, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(_) => return Ok(wanted),
                        Err(actual) => current = actual,
                    }
                }
            }
            CounterBacking::File(path) => {
                let mut issued = 0;
                update_locked(path, |bytes| {
                    let current = match bytes {
                        Some(bytes) => parse_counter(&bytes)?,
                        None => 0,
                    };
                    issued = next(current);
                    Ok(issued.to_string().into_bytes())
                })?;
                Ok(issued)
            }
        }
    }
}

fn parse_counter(bytes: &[u8]) -> StoreResult<u64> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse::<u64>().map_err(|_| {
        StoreError::io_no_source(format!("Counter file holds \"{}\", not a number", trimmed))
    })
}

impl IdGenerator for CounterIdGenerator {
    fn next_id(&self) -> StoreResult<DocumentId> {
        let value = self.advance(|current| current + 1)?;
        Ok(DocumentId::Counter(value))
    }

    fn reserve(&self, id: &DocumentId) -> StoreResult<()> {
        if let DocumentId::Counter(n) = id {
            let n = *n;
            self.advance(|current| current.max(n))?;
        }
        Ok(())
    }
}

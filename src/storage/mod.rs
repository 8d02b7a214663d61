//! Document storage
//!
//! Storage engines are collaborators of the query core: they read, write,
//! delete and list documents by id and nothing more. Every access is locked
//! per file, never per store, so unrelated documents can be written
//! concurrently by different processes.
//!
//! # Design Principles
//!
//! - Shared lock for reads, exclusive lock for writes
//! - Whole-file replace while the lock is held
//! - Lock failures surface immediately as I/O errors
//! - Directory enumeration order carries no meaning

mod backend;
mod file;
mod id_gen;
pub mod locked_io;
mod memory;

pub use backend::DocumentStorage;
pub use file::{FileStorage, DOCUMENT_EXTENSION};
pub use id_gen::{CounterIdGenerator, IdGenerator, UuidIdGenerator, COUNTER_FILE};
pub use memory::MemoryStorage;

//! Observability
//!
//! Structured JSON logging of store lifecycle, query and write events.
//! Observability is read-only: it never changes what an operation does,
//! and a failed log write is ignored.
//!
//! # Usage
//!
//! ```ignore
//! use shelfdb::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::CacheHit, &[("store", "users")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event
pub fn log_event(event: Event) {
    event.emit(&[]);
}

/// Log an event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    event.emit(fields);
}

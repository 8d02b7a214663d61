//! Post-scan transforms
//!
//! - Join expansion
//! - Group-by with aggregation
//! - Field selection with aliases and functions
//! - Field exclusion

pub mod aggregate;
mod group;
mod join;
mod select;

pub use aggregate::{Accumulator, SelectFunction};
pub use group::{group_by, GroupBySpec};
pub use join::{join, JoinSource, JoinSpec};
pub use select::{except, select, SelectField, ALIAS_KEY};

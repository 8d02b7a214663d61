//! Condition evaluation
//!
//! Evaluates one comparison, or a boolean tree of comparisons, against a
//! document. Evaluation is deterministic and side-effect free; structural
//! mistakes in a tree are reported as `InvalidArgument` before any document
//! is scanned.

pub mod compare;
mod leaf;
mod operand;
mod operator;
mod tree;

pub use leaf::Condition;
pub use operand::{Operand, DATE_KEY};
pub use operator::Operator;
pub use tree::{BoolJoin, ConditionNode, Predicate};

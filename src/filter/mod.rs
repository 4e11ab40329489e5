//! The boolean filter model
//!
//! - Operands and predicates (one spatial relation each)
//! - AND-groups (one per drawn shape) and the OR-tree holding them
//! - Distance helpers shared by evaluation and derived geometry

pub mod distance;
pub mod operand;
pub mod predicate;
pub mod tree;

pub use operand::Operand;
pub use predicate::Predicate;
pub use tree::{FilterGroup, FilterTree, TreeId};

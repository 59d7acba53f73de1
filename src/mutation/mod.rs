//! Nested mutations: input parsing, planning and the operation log.

pub mod input;
pub mod operation;
pub mod planner;

pub use input::{CreateNode, DeleteNode, MutationParser, ScalarOp, UpdateNode};
pub use operation::{GraphOperation, MutationInfo, OperationSequence};
pub use planner::MutationPlanner;

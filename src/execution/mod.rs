//! Execution runtime.
//!
//! This module runs linked nodes: one thread per node, fault capture and
//! propagation, and the task-level orchestration around them.

pub mod completion;
pub mod fault;
pub mod node;
pub mod task;

pub use completion::CompletionCell;
pub use node::{Node, NodeOutcome, NodeState, NodeStats, STAT_AVG_EXEC_TIME};
pub use task::{TaskEnv, TaskGraph};

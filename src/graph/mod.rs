//! Edges between nodes and graph rendering.
//!
//! A conduit is the bounded, typed queue connecting one parent to one
//! child. Each conduit keeps per-group counters that feed node statistics
//! and the DOT export.

pub mod conduit;
pub mod dot;

// Re-export commonly used types
pub use conduit::{Conduit, GroupStat};
pub use dot::DotStyle;

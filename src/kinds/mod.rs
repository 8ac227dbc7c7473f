//! Built-in node kinds.
//!
//! These are deliberately small: they exercise the engine (sources, fan-out,
//! stateful snapshots, sinks) without implementing any real windowing or
//! evaluation logic.

pub mod count;
pub mod func;
pub mod passthrough;
pub mod sink;
pub mod source;

pub use count::GroupCountNode;
pub use func::FnNode;
pub use passthrough::PassthroughNode;
pub use sink::CollectSink;
pub use source::SourceNode;

//! # edgeflow - Streaming Pipeline Engine
//!
//! edgeflow runs a directed graph of processing nodes. Every node runs its
//! routine on its own thread; nodes are connected by bounded conduits that
//! apply backpressure and keep per-group record counts.
//!
//! ## Features
//!
//! - **Typed Links**: a parent can only feed a child that wants what it provides
//! - **Backpressure**: conduits hold a fixed number of records, writers block when full
//! - **Fault Propagation**: a failing or panicking node aborts its inputs so
//!   the whole upstream chain unwinds instead of deadlocking
//! - **Statistics**: per-node execution time, per-group counters and a DOT export
//! - **Snapshots**: stateful kinds save and restore their state across restarts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use edgeflow::prelude::*;
//! use std::sync::Arc;
//!
//! let env = TaskEnv::new("cpu", StreamType::Stream, EngineConfig::default());
//! let mut graph = TaskGraph::new(env)?;
//!
//! graph.add_node("src", Arc::new(SourceNode::new(StreamType::Stream, records)))?;
//! graph.add_node("count", Arc::new(GroupCountNode::new()))?;
//! graph.add_node("sink", Arc::new(CollectSink::new(StreamType::Stream)))?;
//! graph.link("src", "count")?;
//! graph.link("count", "sink")?;
//!
//! graph.start(&TaskSnapshot::new())?;
//! graph.wait()?;
//! println!("{}", graph.dot(true));
//! graph.stop();
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: records, node kind trait, errors, configuration, snapshots
//! - [`graph`]: conduits and DOT rendering
//! - [`metrics`]: statistics registry, timers and the running-max duration
//! - [`execution`]: node runtime and task orchestration
//! - [`kinds`]: built-in node kinds
//!
//! ## Writing a Node Kind
//!
//! Implement [`NodeKind`](core::node::NodeKind):
//!
//! ```rust,ignore
//! use edgeflow::prelude::*;
//!
//! struct Doubler;
//!
//! impl NodeKind for Doubler {
//!     fn kind(&self) -> &str { "doubler" }
//!     fn provides(&self) -> StreamType { StreamType::Stream }
//!     fn wants(&self) -> StreamType { StreamType::Stream }
//!
//!     fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
//!         ctx.for_each_input(|ctx, mut record| {
//!             if let Some(n) = record.payload.as_i64() {
//!                 record.payload = (n * 2).into();
//!             }
//!             Ok(ctx.emit(record)?)
//!         })
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod graph;
pub mod kinds;
pub mod metrics;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use edgeflow::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{Fields, GroupId, Record, StreamType, Tags};

    // Node kinds and context
    pub use crate::core::context::RunContext;
    pub use crate::core::node::NodeKind;

    // Configuration and snapshots
    pub use crate::core::config::EngineConfig;
    pub use crate::core::snapshot::{decode_state, encode_state, TaskSnapshot};

    // Errors
    pub use crate::core::error::{
        ConduitError, FaultKind, FlowError, FlowResult, RunFault, SnapshotError,
    };

    // Graph
    pub use crate::graph::conduit::{Conduit, GroupStat};
    pub use crate::graph::dot::DotStyle;

    // Metrics
    pub use crate::metrics::{
        DurationSink, IntVar, MaxDuration, MemoryRegistry, SampledTiming, StatMap, StatVar,
        StatsRegistry, Timer, TimingService,
    };

    // Execution
    pub use crate::execution::node::{Node, NodeState, NodeStats, STAT_AVG_EXEC_TIME};
    pub use crate::execution::task::{TaskEnv, TaskGraph};

    // Built-in kinds
    pub use crate::kinds::{CollectSink, FnNode, GroupCountNode, PassthroughNode, SourceNode};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "edgeflow");
    }

    #[test]
    fn test_fan_out_pipeline() {
        let env = TaskEnv::new("fan", StreamType::Stream, EngineConfig::default());
        let mut graph = TaskGraph::new(env).unwrap();

        let source = (0..4).map(|i| Record::new(json!(i))).collect();
        graph
            .add_node("src", Arc::new(SourceNode::new(StreamType::Stream, source)))
            .unwrap();
        let left = CollectSink::new(StreamType::Stream);
        let right = CollectSink::new(StreamType::Stream);
        let (left_out, right_out) = (left.records(), right.records());
        graph.add_node("left", Arc::new(left)).unwrap();
        graph.add_node("right", Arc::new(right)).unwrap();
        graph.link("src", "left").unwrap();
        graph.link("src", "right").unwrap();

        graph.start(&TaskSnapshot::new()).unwrap();
        graph.wait().unwrap();
        graph.stop();

        assert_eq!(left_out.lock().len(), 4);
        assert_eq!(right_out.lock().len(), 4);
        let src = graph.node("src").unwrap();
        assert_eq!(src.stats_by_group()[&GroupId::nil()].fields["emitted"], 4);
        assert_eq!(graph.node("right").unwrap().collected_count(), 4);
    }
}

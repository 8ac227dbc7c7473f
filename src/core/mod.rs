//! Core types and traits for the edgeflow pipeline engine.
//!
//! This module contains the foundational pieces every node builds on:
//! - Record and group types
//! - The node kind trait and its run context
//! - Error types
//! - Engine configuration
//! - Snapshot blobs

pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use context::RunContext;
pub use error::{ConduitError, FaultKind, FlowError, FlowResult, RunFault, SnapshotError};
pub use node::NodeKind;
pub use snapshot::TaskSnapshot;
pub use types::{Fields, GroupId, Record, StreamType, Tags};

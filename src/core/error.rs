//! Error types for edgeflow.
//!
//! Uses thiserror for structured errors. Every engine error is `Clone`
//! because a node's terminal error is handed out to any number of waiters.

use crate::core::types::StreamType;
use thiserror::Error;

/// Top-level error type for graph construction and execution.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// Declared output/input stream types disagree at link time.
    #[error("cannot add child mismatched edges: {parent} ({provides}) -> {child} ({wants})")]
    LinkTypeMismatch {
        /// Would-be parent.
        parent: String,
        /// Would-be child.
        child: String,
        /// Parent's output type.
        provides: StreamType,
        /// Child's input type.
        wants: StreamType,
    },

    /// A run routine failed.
    #[error(transparent)]
    Run(#[from] RunFault),

    /// A conduit rejected a read or write.
    #[error(transparent)]
    Conduit(#[from] ConduitError),

    /// State could not be saved or restored.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// `start` or a link was attempted on a running node.
    #[error("node {0} has already been started")]
    AlreadyStarted(String),

    /// Completion was awaited on a node that never started.
    #[error("node {0} was never started")]
    NotStarted(String),

    /// No node with that name exists.
    #[error("node {0} not found")]
    NodeNotFound(String),

    /// The node name is taken.
    #[error("a node named {0} already exists")]
    DuplicateNode(String),

    /// The node thread could not be spawned.
    #[error("failed to spawn node {node}: {error}")]
    Spawn {
        /// Node whose thread failed to start.
        node: String,
        /// OS error.
        error: String,
    },

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure observed by a producer or consumer of a conduit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConduitError {
    /// The conduit was aborted during fault unwinding.
    #[error("conduit {0} aborted")]
    Aborted(String),

    /// The conduit no longer accepts writes.
    #[error("conduit {0} is closed")]
    Closed(String),
}

impl ConduitError {
    /// Whether this is the abort unwinding signal.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ConduitError::Aborted(_))
    }
}

/// How a run routine came to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The routine returned an error.
    Error,
    /// The routine panicked.
    Panic,
    /// The routine stopped because a conduit it used was aborted downstream.
    Aborted,
}

/// A node's run routine failed, either by returning an error or by panicking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RunFault {
    /// Node that failed.
    pub node: String,
    /// Description of the failure.
    pub message: String,
    /// How the routine failed.
    pub kind: FaultKind,
    /// Stack excerpt captured when the failure was a panic.
    pub trace: Option<String>,
}

impl RunFault {
    /// Create a fault from a returned error.
    pub fn returned(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            message: message.into(),
            kind: FaultKind::Error,
            trace: None,
        }
    }

    /// Create a fault for a routine unwound by an aborted conduit.
    pub fn aborted(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Aborted,
            ..Self::returned(node, message)
        }
    }

    /// Create a fault from an intercepted panic.
    pub fn panicked(node: impl Into<String>, message: impl Into<String>, trace: String) -> Self {
        let message = format!("{}: Trace:{}", message.into(), trace);
        Self {
            node: node.into(),
            message,
            kind: FaultKind::Panic,
            trace: Some(trace),
        }
    }

    /// Whether the fault came from a panic.
    pub fn is_panic(&self) -> bool {
        self.kind == FaultKind::Panic
    }

    /// Whether the fault is only the echo of a failure further downstream.
    pub fn is_abort(&self) -> bool {
        self.kind == FaultKind::Aborted
    }
}

/// Errors producing or consuming snapshot blobs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// State could not be serialized.
    #[error("failed to snapshot {kind} node: {reason}")]
    Serialization {
        /// Node kind.
        kind: String,
        /// Underlying cause.
        reason: String,
    },

    /// Blob was malformed or came from a different kind.
    #[error("failed to restore {kind} node: {reason}")]
    Deserialization {
        /// Node kind.
        kind: String,
        /// Underlying cause.
        reason: String,
    },
}

/// Result type alias for edgeflow operations.
pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    /// Get the node this error is about, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            FlowError::LinkTypeMismatch { parent, .. } => Some(parent.as_str()),
            FlowError::Run(fault) => Some(fault.node.as_str()),
            FlowError::AlreadyStarted(node)
            | FlowError::NotStarted(node)
            | FlowError::NodeNotFound(node)
            | FlowError::DuplicateNode(node)
            | FlowError::Spawn { node, .. } => Some(node.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_mismatch_message() {
        let err = FlowError::LinkTypeMismatch {
            parent: "a".to_string(),
            child: "c".to_string(),
            provides: StreamType::Batch,
            wants: StreamType::Stream,
        };
        assert_eq!(
            err.to_string(),
            "cannot add child mismatched edges: a (batch) -> c (stream)"
        );
        assert_eq!(err.node(), Some("a"));
    }

    #[test]
    fn test_panic_fault_carries_trace() {
        let fault = RunFault::panicked("b", "boom", "frame 0".to_string());
        assert!(fault.is_panic());
        assert!(fault.message.starts_with("boom: Trace:"));
        assert!(!RunFault::returned("b", "nope").is_panic());
        assert!(RunFault::aborted("a", "conduit aborted").is_abort());
    }

    #[test]
    fn test_conduit_error_kind() {
        assert!(ConduitError::Aborted("a->b".into()).is_aborted());
        assert!(!ConduitError::Closed("a->b".into()).is_aborted());
    }
}

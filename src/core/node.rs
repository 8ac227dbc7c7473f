//! The node-kind contract.
//!
//! The execution engine is kind-agnostic: everything that differs between
//! node kinds (declared stream types, the run routine, optional stop and
//! snapshot hooks) is reached through [`NodeKind`].
//!
//! Hooks take `&self` because `stop` may be called from the orchestrator
//! while `run` is still executing on the node's own thread; stateful kinds
//! keep their state behind interior mutability.

use crate::core::context::RunContext;
use crate::core::error::SnapshotError;
use crate::core::types::StreamType;

/// Behavior of one kind of pipeline stage.
pub trait NodeKind: Send + Sync {
    /// Kind name (e.g. "window", "count"), used in stats tags and snapshots.
    fn kind(&self) -> &str;

    /// Stream type this kind writes to its children.
    fn provides(&self) -> StreamType;

    /// Stream type this kind reads from its parents.
    fn wants(&self) -> StreamType;

    /// Process records until the inputs end or an error occurs.
    ///
    /// Returning an error (or panicking) terminates the node with a fault
    /// and aborts its inputs.
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()>;

    /// Release kind-specific resources such as internal timers.
    ///
    /// Must not assume `run` has returned.
    fn stop(&self) {}

    /// Serialize accumulated state for restart continuity.
    fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(Vec::new())
    }

    /// Restore state from a blob produced by `snapshot` of the same kind.
    fn restore(&self, _blob: &[u8]) -> Result<(), SnapshotError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl NodeKind for Noop {
        fn kind(&self) -> &str {
            "noop"
        }

        fn provides(&self) -> StreamType {
            StreamType::None
        }

        fn wants(&self) -> StreamType {
            StreamType::None
        }

        fn run(&self, _ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let node = Noop;
        node.stop();
        assert!(node.snapshot().unwrap().is_empty());
        assert!(node.restore(b"anything").is_ok());
    }
}

//! Node kind backed by a closure.

use crate::core::context::RunContext;
use crate::core::node::NodeKind;
use crate::core::types::StreamType;

type RunFn = dyn Fn(&mut RunContext<'_>) -> anyhow::Result<()> + Send + Sync;

/// Runs an arbitrary closure as its run routine.
pub struct FnNode {
    kind: String,
    wants: StreamType,
    provides: StreamType,
    run: Box<RunFn>,
}

impl FnNode {
    /// Wrap `run` as a kind named `kind`.
    pub fn new<F>(kind: impl Into<String>, wants: StreamType, provides: StreamType, run: F) -> Self
    where
        F: Fn(&mut RunContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            wants,
            provides,
            run: Box::new(run),
        }
    }
}

impl NodeKind for FnNode {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn provides(&self) -> StreamType {
        self.provides
    }

    fn wants(&self) -> StreamType {
        self.wants
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        (self.run)(ctx)
    }
}

//! Forwards every input record to every output.

use crate::core::context::RunContext;
use crate::core::node::NodeKind;
use crate::core::types::StreamType;

/// Forwards records unchanged, timing each one.
pub struct PassthroughNode {
    stream_type: StreamType,
}

impl PassthroughNode {
    /// Create a passthrough for `stream_type` records.
    pub fn new(stream_type: StreamType) -> Self {
        Self { stream_type }
    }
}

impl NodeKind for PassthroughNode {
    fn kind(&self) -> &str {
        "passthrough"
    }

    fn provides(&self) -> StreamType {
        self.stream_type
    }

    fn wants(&self) -> StreamType {
        self.stream_type
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        ctx.for_each_input(|ctx, record| {
            ctx.timer().start();
            let res = ctx.emit(record);
            ctx.timer().stop();
            Ok(res?)
        })
    }
}

//! Source node emitting a fixed list of records.

use crate::core::context::RunContext;
use crate::core::node::NodeKind;
use crate::core::types::{Record, StreamType};
use parking_lot::Mutex;

/// Emits its records once, in order, then ends.
pub struct SourceNode {
    provides: StreamType,
    records: Mutex<Vec<Record>>,
}

impl SourceNode {
    /// Create a source that emits `records` as `provides`.
    pub fn new(provides: StreamType, records: Vec<Record>) -> Self {
        Self {
            provides,
            records: Mutex::new(records),
        }
    }
}

impl NodeKind for SourceNode {
    fn kind(&self) -> &str {
        "source"
    }

    fn provides(&self) -> StreamType {
        self.provides
    }

    fn wants(&self) -> StreamType {
        StreamType::None
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let records = std::mem::take(&mut *self.records.lock());
        for record in records {
            ctx.timer().start();
            let res = ctx.emit(record);
            ctx.timer().stop();
            res?;
        }
        Ok(())
    }
}

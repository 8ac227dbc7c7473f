//! Terminal node that keeps what it reads.

use crate::core::context::RunContext;
use crate::core::node::NodeKind;
use crate::core::types::{Record, StreamType};
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects every record from its inputs into a shared buffer.
pub struct CollectSink {
    wants: StreamType,
    records: Arc<Mutex<Vec<Record>>>,
}

impl CollectSink {
    /// Create a sink accepting `wants` records.
    pub fn new(wants: StreamType) -> Self {
        Self {
            wants,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the collected records, usable after the node is moved into a graph.
    pub fn records(&self) -> Arc<Mutex<Vec<Record>>> {
        self.records.clone()
    }
}

impl NodeKind for CollectSink {
    fn kind(&self) -> &str {
        "collect"
    }

    fn provides(&self) -> StreamType {
        StreamType::None
    }

    fn wants(&self) -> StreamType {
        self.wants
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let records = self.records.clone();
        ctx.for_each_input(|ctx, record| {
            ctx.timer().time(|| records.lock().push(record));
            Ok(())
        })
    }
}

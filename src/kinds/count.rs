//! Stateful per-group counter.
//!
//! Counts records per group while the stream runs and emits one count
//! record per group when its inputs end. The counts survive restarts
//! through `snapshot`/`restore`.

use crate::core::context::RunContext;
use crate::core::error::SnapshotError;
use crate::core::node::NodeKind;
use crate::core::snapshot::{decode_state, encode_state};
use crate::core::types::{GroupId, Record, StreamType, Tags};
use crate::metrics::registry::IntVar;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const KIND: &str = "count";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GroupCount {
    group: GroupId,
    tags: Tags,
    dimensions: Vec<String>,
    count: u64,
}

/// Counts records per group and emits the totals at end of stream.
pub struct GroupCountNode {
    counts: Mutex<IndexMap<GroupId, GroupCount>>,
}

impl GroupCountNode {
    /// Create a counter with no groups.
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(IndexMap::new()),
        }
    }

    /// Current count for `group`.
    pub fn count(&self, group: &GroupId) -> u64 {
        self.counts.lock().get(group).map_or(0, |c| c.count)
    }

    fn observe(&self, record: &Record) -> usize {
        let mut counts = self.counts.lock();
        counts
            .entry(record.group.clone())
            .or_insert_with(|| GroupCount {
                group: record.group.clone(),
                tags: record.tags.clone(),
                dimensions: record.dimensions.clone(),
                count: 0,
            })
            .count += 1;
        counts.len()
    }
}

impl Default for GroupCountNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for GroupCountNode {
    fn kind(&self) -> &str {
        KIND
    }

    fn provides(&self) -> StreamType {
        StreamType::Stream
    }

    fn wants(&self) -> StreamType {
        StreamType::Stream
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let groups = Arc::new(IntVar::new());
        groups.set(self.counts.lock().len() as i64);
        ctx.stats().set("groups", groups.clone());

        ctx.for_each_input(|ctx, record| {
            let n = ctx.timer().time(|| self.observe(&record));
            groups.set(n as i64);
            Ok(())
        })?;

        let totals: Vec<GroupCount> = self.counts.lock().values().cloned().collect();
        for total in totals {
            let record = Record {
                group: total.group,
                tags: total.tags,
                dimensions: total.dimensions,
                payload: json!({ "count": total.count }),
            };
            ctx.emit(record)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        let state: Vec<GroupCount> = self.counts.lock().values().cloned().collect();
        encode_state(KIND, &state)
    }

    fn restore(&self, blob: &[u8]) -> Result<(), SnapshotError> {
        let state: Vec<GroupCount> = decode_state(KIND, blob)?;
        let mut counts = self.counts.lock();
        counts.clear();
        for entry in state {
            counts.insert(entry.group.clone(), entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host: &str) -> Record {
        let mut tags = Tags::new();
        tags.insert("host".into(), host.into());
        Record::grouped(vec!["host".into()], tags, json!(null))
    }

    #[test]
    fn test_snapshot_restore() {
        let node = GroupCountNode::new();
        node.observe(&record("a"));
        node.observe(&record("a"));
        node.observe(&record("b"));
        let blob = node.snapshot().unwrap();

        let restored = GroupCountNode::new();
        restored.restore(&blob).unwrap();
        assert_eq!(restored.count(&record("a").group), 2);
        assert_eq!(restored.count(&record("b").group), 1);
    }

    #[test]
    fn test_restore_rejects_foreign_blob() {
        let blob = encode_state("window", &Vec::<u8>::new()).unwrap();
        let err = GroupCountNode::new().restore(&blob).unwrap_err();
        assert!(matches!(err, SnapshotError::Deserialization { .. }));
    }
}

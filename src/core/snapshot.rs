//! Snapshot blobs for stateful node kinds.
//!
//! A blob is a JSON envelope naming the kind that produced it, so a kind
//! can refuse state written by a different kind.

use crate::core::error::SnapshotError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    kind: String,
    state: T,
}

/// Serialize `state` into a blob tagged with `kind`.
pub fn encode_state<T: Serialize>(kind: &str, state: &T) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec(&Envelope {
        kind: kind.to_string(),
        state,
    })
    .map_err(|e| SnapshotError::Serialization {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Deserialize a blob previously produced by [`encode_state`] for the same `kind`.
pub fn decode_state<T: DeserializeOwned>(kind: &str, blob: &[u8]) -> Result<T, SnapshotError> {
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_slice(blob).map_err(|e| SnapshotError::Deserialization {
            kind: kind.to_string(),
            reason: e.to_string(),
        })?;
    if envelope.kind != kind {
        return Err(SnapshotError::Deserialization {
            kind: kind.to_string(),
            reason: format!("snapshot was taken from a {} node", envelope.kind),
        });
    }
    serde_json::from_value(envelope.state).map_err(|e| SnapshotError::Deserialization {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Snapshot of every node in a task, keyed by node name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Blob per node name.
    pub node_snapshots: BTreeMap<String, Vec<u8>>,
}

impl TaskSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blob for a node, if one was recorded.
    pub fn get(&self, node: &str) -> Option<&[u8]> {
        self.node_snapshots.get(node).map(Vec::as_slice)
    }

    /// Serialize to JSON bytes for an external checkpoint store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_same_kind() {
        let blob = encode_state("count", &vec![1u64, 2, 3]).unwrap();
        let state: Vec<u64> = decode_state("count", &blob).unwrap();
        assert_eq!(state, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_rejects_other_kind() {
        let blob = encode_state("window", &5u32).unwrap();
        let err = decode_state::<u32>("count", &blob).unwrap_err();
        assert!(matches!(err, SnapshotError::Deserialization { .. }));
        assert!(err.to_string().contains("window"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_state::<u32>("count", b"not json").unwrap_err();
        assert!(matches!(err, SnapshotError::Deserialization { .. }));
    }

    #[test]
    fn test_task_snapshot_bytes() {
        let mut snap = TaskSnapshot::new();
        snap.node_snapshots.insert("count1".into(), vec![1, 2]);
        let restored = TaskSnapshot::from_bytes(&snap.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.get("count1"), Some(&[1u8, 2][..]));
        assert_eq!(restored.get("missing"), None);
    }
}

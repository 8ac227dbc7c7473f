//! Core data types that flow through the graph.
//!
//! The engine never looks inside a record's payload. It only reads the
//! group tag (for per-group accounting) and the tags/dimensions that
//! describe the group (retained for reporting).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shape of the data carried by a conduit.
///
/// A producer's declared output type must equal the consumer's declared
/// input type for the two to be linked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// The node neither produces nor consumes records on this side.
    None,
    /// Individual points, one record at a time.
    Stream,
    /// Windowed batches of points.
    Batch,
}

impl StreamType {
    /// Get the display name for this stream type.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::None => "none",
            StreamType::Stream => "stream",
            StreamType::Batch => "batch",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one distinct dimension-value combination.
///
/// Used only to bucket per-group counters; groups have no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// The group of records that are not grouped by any dimension.
    pub fn nil() -> Self {
        Self(String::new())
    }

    /// Create a group ID from its raw string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a group ID from the dimensions a record is grouped by.
    ///
    /// Produces `dim1=value1,dim2=value2` with dimensions sorted by name,
    /// so the same combination always yields the same ID. Missing tag
    /// values contribute an empty value.
    pub fn from_dimensions(dimensions: &[String], tags: &Tags) -> Self {
        if dimensions.is_empty() {
            return Self::nil();
        }
        let mut dims: Vec<&String> = dimensions.iter().collect();
        dims.sort();
        let id = dims
            .iter()
            .map(|d| {
                let value = tags.get(d.as_str()).map(String::as_str).unwrap_or("");
                format!("{}={}", d, value)
            })
            .collect::<Vec<_>>()
            .join(",");
        Self(id)
    }

    /// Borrow the raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the ungrouped group.
    pub fn is_nil(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag set attached to a record.
pub type Tags = BTreeMap<String, String>;

/// Reportable fields of a statistics entry.
pub type Fields = BTreeMap<String, i64>;

/// One unit of data moving through a conduit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Group this record belongs to.
    pub group: GroupId,
    /// Tags describing the group.
    pub tags: Tags,
    /// Dimensions the group was formed from.
    pub dimensions: Vec<String>,
    /// Opaque payload, never inspected by the engine.
    pub payload: serde_json::Value,
}

impl Record {
    /// Create an ungrouped record.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            group: GroupId::nil(),
            tags: Tags::new(),
            dimensions: Vec::new(),
            payload,
        }
    }

    /// Create a record grouped by `dimensions`, deriving the group from `tags`.
    pub fn grouped(dimensions: Vec<String>, tags: Tags, payload: serde_json::Value) -> Self {
        let group = GroupId::from_dimensions(&dimensions, &tags);
        Self {
            group,
            tags,
            dimensions,
            payload,
        }
    }

    /// Override the group tag.
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = group;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_group_id_is_order_independent() {
        let t = tags(&[("host", "a"), ("region", "eu")]);
        let g1 = GroupId::from_dimensions(&["host".into(), "region".into()], &t);
        let g2 = GroupId::from_dimensions(&["region".into(), "host".into()], &t);
        assert_eq!(g1, g2);
        assert_eq!(g1.as_str(), "host=a,region=eu");
    }

    #[test]
    fn test_ungrouped_record() {
        let r = Record::new(json!(1));
        assert!(r.group.is_nil());
        assert!(r.dimensions.is_empty());
    }

    #[test]
    fn test_grouped_record_missing_tag() {
        let r = Record::grouped(vec!["host".into()], Tags::new(), json!(null));
        assert_eq!(r.group.as_str(), "host=");
    }

    #[test]
    fn test_stream_type_display() {
        assert_eq!(StreamType::Batch.to_string(), "batch");
        assert_eq!(
            serde_json::to_string(&StreamType::Stream).unwrap(),
            "\"stream\""
        );
    }
}

//! DOT rendering of running nodes.
//!
//! Each node renders one declaration carrying its live statistics plus
//! one edge declaration per direct child carrying the number of records
//! the connecting conduit has passed. A walker concatenates the fragments
//! of every node into a full `digraph`.
//!
//! Two forms are supported: a human-readable one that puts statistics in
//! a label, and an attribute form with one attribute per statistic.

use std::fmt::Write;

/// Which DOT form to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotStyle {
    /// Statistics embedded in a multi-value label.
    Labels,
    /// Each statistic as its own attribute.
    Attributes,
}

impl DotStyle {
    /// Pick the style from a `labels` flag.
    pub fn from_labels(labels: bool) -> Self {
        if labels {
            DotStyle::Labels
        } else {
            DotStyle::Attributes
        }
    }
}

/// Render one node fragment into `buf`.
///
/// `stats` are `(key, value)` pairs in display order; `edges` are
/// `(child, processed)` pairs, one per output conduit.
pub fn render_node(
    buf: &mut String,
    name: &str,
    stats: &[(String, String)],
    edges: &[(String, u64)],
    style: DotStyle,
) {
    // Writing to a String cannot fail.
    match style {
        DotStyle::Labels => {
            let _ = write!(buf, "\n{} [label=\"{} ", name, name);
            for (key, value) in stats {
                let _ = write!(buf, "{}={} ", key, value);
            }
            buf.push_str("\"];\n");
            for (child, processed) in edges {
                let _ = writeln!(buf, "{} -> {} [label=\"{}\"];", name, child, processed);
            }
        }
        DotStyle::Attributes => {
            let _ = write!(buf, "\n{} [", name);
            for (key, value) in stats {
                let _ = write!(buf, "{}=\"{}\" ", key, value);
            }
            buf.push_str("];\n");
            for (child, processed) in edges {
                let _ = writeln!(buf, "{} -> {} [processed=\"{}\"];", name, child, processed);
            }
        }
    }
}

/// Wrap rendered node fragments in a `digraph` declaration.
pub fn wrap_digraph(name: &str, body: &str) -> String {
    format!("digraph {} {{\n{}}}", name, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> Vec<(String, String)> {
        vec![
            ("avg_exec_time".to_string(), "1.5ms".to_string()),
            ("errors".to_string(), "0".to_string()),
        ]
    }

    #[test]
    fn test_labels_form() {
        let mut buf = String::new();
        render_node(
            &mut buf,
            "window1",
            &stats(),
            &[("sum2".to_string(), 42)],
            DotStyle::Labels,
        );
        assert_eq!(
            buf,
            "\nwindow1 [label=\"window1 avg_exec_time=1.5ms errors=0 \"];\nwindow1 -> sum2 [label=\"42\"];\n"
        );
    }

    #[test]
    fn test_attributes_form() {
        let mut buf = String::new();
        render_node(
            &mut buf,
            "window1",
            &stats(),
            &[("sum2".to_string(), 42), ("log3".to_string(), 7)],
            DotStyle::Attributes,
        );
        assert_eq!(
            buf,
            "\nwindow1 [avg_exec_time=\"1.5ms\" errors=\"0\" ];\nwindow1 -> sum2 [processed=\"42\"];\nwindow1 -> log3 [processed=\"7\"];\n"
        );
    }

    #[test]
    fn test_leaf_node_without_stats() {
        let mut buf = String::new();
        render_node(&mut buf, "sink", &[], &[], DotStyle::Attributes);
        assert_eq!(buf, "\nsink [];\n");
    }

    #[test]
    fn test_wrap_digraph() {
        assert_eq!(wrap_digraph("cpu", "\na [];\n"), "digraph cpu {\n\na [];\n}");
        assert_eq!(DotStyle::from_labels(true), DotStyle::Labels);
    }
}

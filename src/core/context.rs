//! Run context.
//!
//! The context is what a node kind's run routine sees of the engine: its
//! input and output conduits, the snapshot it was started with, a timer
//! feeding the node's execution-time metric, and its live statistics.

use crate::core::error::ConduitError;
use crate::core::types::Record;
use crate::graph::conduit::Conduit;
use crate::metrics::registry::StatMap;
use crate::metrics::timer::Timer;
use anyhow::Context;
use crossbeam::channel;
use std::sync::Arc;
use std::thread;

/// Context provided to a run routine.
pub struct RunContext<'a> {
    node: &'a str,
    inputs: &'a [Arc<Conduit>],
    outputs: &'a [Arc<Conduit>],
    snapshot: Option<&'a [u8]>,
    timer: &'a mut Timer,
    stats: &'a Arc<StatMap>,
}

impl<'a> RunContext<'a> {
    /// Create a new run context.
    pub fn new(
        node: &'a str,
        inputs: &'a [Arc<Conduit>],
        outputs: &'a [Arc<Conduit>],
        snapshot: Option<&'a [u8]>,
        timer: &'a mut Timer,
        stats: &'a Arc<StatMap>,
    ) -> Self {
        Self {
            node,
            inputs,
            outputs,
            snapshot,
            timer,
            stats,
        }
    }

    /// Name of the running node.
    pub fn node_name(&self) -> &'a str {
        self.node
    }

    /// Conduits from the node's parents.
    pub fn inputs(&self) -> &'a [Arc<Conduit>] {
        self.inputs
    }

    /// Conduits to the node's children.
    pub fn outputs(&self) -> &'a [Arc<Conduit>] {
        self.outputs
    }

    /// Snapshot blob the node was started with, if any.
    pub fn snapshot(&self) -> Option<&'a [u8]> {
        self.snapshot.filter(|s| !s.is_empty())
    }

    /// Timer to wrap per-record processing with.
    pub fn timer(&mut self) -> &mut Timer {
        &mut *self.timer
    }

    /// Live statistics of the node; kinds may add their own entries.
    pub fn stats(&self) -> &Arc<StatMap> {
        self.stats
    }

    /// Write `record` to every output conduit.
    ///
    /// Fails on the first conduit that rejects the write.
    pub fn emit(&self, record: Record) -> Result<(), ConduitError> {
        if let Some((last, rest)) = self.outputs.split_last() {
            for out in rest {
                out.write(record.clone())?;
            }
            last.write(record)?;
        }
        Ok(())
    }

    /// Read every input to its end, calling `f` for each record.
    ///
    /// With several inputs each conduit gets its own reader thread, so a
    /// slow or idle parent never holds back records from the others. Order
    /// is kept within one input; across inputs records interleave as they
    /// arrive. Stops early and returns the error if `f` fails; records a
    /// reader had already taken are then dropped.
    pub fn for_each_input(
        &mut self,
        mut f: impl FnMut(&mut Self, Record) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let inputs = self.inputs;
        if inputs.len() <= 1 {
            for input in inputs {
                while let Some(record) = input.read() {
                    f(self, record)?;
                }
            }
            return Ok(());
        }

        let (tx, rx) = channel::bounded::<Record>(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let input = input.clone();
            let tx = tx.clone();
            thread::Builder::new()
                .name(format!("{}-in-{}", self.node, i))
                .spawn(move || {
                    while let Some(record) = input.read() {
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                })
                .with_context(|| format!("failed to spawn reader for {}", inputs[i].name()))?;
        }
        drop(tx);

        for record in rx.iter() {
            f(self, record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StreamType;
    use serde_json::json;

    fn conduit(child: &str) -> Arc<Conduit> {
        Arc::new(Conduit::new("t", "n", child, StreamType::Stream, 4))
    }

    #[test]
    fn test_emit_fans_out() {
        let outs = vec![conduit("a"), conduit("b")];
        let mut timer = Timer::disabled();
        let stats = Arc::new(StatMap::new());
        let ctx = RunContext::new("n", &[], &outs, None, &mut timer, &stats);

        ctx.emit(Record::new(json!(1))).unwrap();
        assert_eq!(outs[0].collected_count(), 1);
        assert_eq!(outs[1].collected_count(), 1);
    }

    #[test]
    fn test_for_each_input_reads_all() {
        let ins = vec![conduit("x"), conduit("y")];
        for (i, c) in ins.iter().enumerate() {
            c.write(Record::new(json!(i))).unwrap();
            c.close();
        }
        let mut timer = Timer::disabled();
        let stats = Arc::new(StatMap::new());
        let mut ctx = RunContext::new("n", &ins, &[], Some(&[][..]), &mut timer, &stats);
        assert!(ctx.snapshot().is_none());

        let mut seen = Vec::new();
        ctx.for_each_input(|_, r| {
            seen.push(r.payload);
            Ok(())
        })
        .unwrap();
        seen.sort_by_key(|v| v.as_i64());
        assert_eq!(seen, vec![json!(0), json!(1)]);
    }

    #[test]
    fn test_for_each_input_does_not_wait_on_idle_input() {
        let idle = Arc::new(Conduit::new("t", "idle", "n", StreamType::Stream, 1));
        let busy = Arc::new(Conduit::new("t", "busy", "n", StreamType::Stream, 1));
        let ins = vec![idle.clone(), busy.clone()];

        let writer = std::thread::spawn(move || {
            for i in 0..5 {
                busy.write(Record::new(json!(i))).unwrap();
            }
            busy.close();
            idle.close();
        });

        let mut timer = Timer::disabled();
        let stats = Arc::new(StatMap::new());
        let mut ctx = RunContext::new("n", &ins, &[], None, &mut timer, &stats);
        let mut seen = Vec::new();
        ctx.for_each_input(|_, r| {
            seen.push(r.payload);
            Ok(())
        })
        .unwrap();
        writer.join().unwrap();
        assert_eq!(seen, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
    }
}

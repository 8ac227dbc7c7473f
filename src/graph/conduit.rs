//! Bounded, flow-controlled conduit between two nodes.
//!
//! Each conduit has exactly one producer and one consumer. Writers block
//! while the queue is full, readers block while it is empty. Counters are
//! kept overall and per group: `collected` counts writes, `emitted` counts
//! reads, so `collected - emitted` is the live backlog.

use crate::core::error::ConduitError;
use crate::core::types::{GroupId, Record, StreamType, Tags};
use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-group counters and the last tags/dimensions seen for the group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupStat {
    /// Records written for the group.
    pub collected: u64,
    /// Records read for the group.
    pub emitted: u64,
    /// Tags last seen for the group.
    pub tags: Tags,
    /// Dimensions last seen for the group.
    pub dimensions: Vec<String>,
}

#[derive(Debug, Default)]
struct ConduitState {
    queue: VecDeque<Record>,
    closed: bool,
    aborted: bool,
    groups: IndexMap<GroupId, GroupStat>,
}

/// A bounded single-producer/single-consumer pipe carrying grouped records.
#[derive(Debug)]
pub struct Conduit {
    name: String,
    stream_type: StreamType,
    capacity: usize,
    state: Mutex<ConduitState>,
    not_empty: Condvar,
    not_full: Condvar,
    collected: AtomicU64,
    emitted: AtomicU64,
}

impl Conduit {
    /// Create a conduit from `parent` to `child` within `task`.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(
        task: &str,
        parent: &str,
        child: &str,
        stream_type: StreamType,
        capacity: usize,
    ) -> Self {
        Self {
            name: format!("{}|{}->{}", task, parent, child),
            stream_type,
            capacity: capacity.max(1),
            state: Mutex::new(ConduitState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            collected: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
        }
    }

    /// Name of the form `task|parent->child`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream type fixed at link time.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write a record, blocking while the queue is full.
    ///
    /// Fails with [`ConduitError::Aborted`] if the conduit is (or becomes)
    /// aborted while waiting, and with [`ConduitError::Closed`] if the
    /// producer has already closed it.
    pub fn write(&self, record: Record) -> Result<(), ConduitError> {
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return Err(ConduitError::Aborted(self.name.clone()));
            }
            if state.closed {
                return Err(ConduitError::Closed(self.name.clone()));
            }
            if state.queue.len() < self.capacity {
                break;
            }
            self.not_full.wait(&mut state);
        }

        let stat = state
            .groups
            .entry(record.group.clone())
            .or_insert_with(|| GroupStat {
                tags: record.tags.clone(),
                dimensions: record.dimensions.clone(),
                ..GroupStat::default()
            });
        stat.collected += 1;
        self.collected.fetch_add(1, Ordering::Release);
        state.queue.push_back(record);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Read the next record, blocking while the queue is empty.
    ///
    /// Returns `None` at end of stream (closed and drained) or as soon as
    /// the conduit is aborted.
    pub fn read(&self) -> Option<Record> {
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return None;
            }
            if let Some(record) = state.queue.pop_front() {
                let stat = state.groups.entry(record.group.clone()).or_default();
                stat.emitted += 1;
                stat.tags = record.tags.clone();
                stat.dimensions = record.dimensions.clone();
                self.emitted.fetch_add(1, Ordering::Release);
                drop(state);

                self.not_full.notify_one();
                return Some(record);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Stop accepting writes; queued records still drain before end of stream.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);

        log::debug!(
            "closing conduit {} c: {} e: {}",
            self.name,
            self.collected_count(),
            self.emitted_count()
        );
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Unblock every pending writer and reader and discard queued records.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if state.aborted {
            return;
        }
        state.aborted = true;
        let discarded = state.queue.len();
        state.queue.clear();
        drop(state);

        log::debug!(
            "aborting conduit {} discarded: {}",
            self.name,
            discarded
        );
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Whether `abort` has been called.
    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Number of records currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether no records are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total records written.
    pub fn collected_count(&self) -> u64 {
        self.collected.load(Ordering::Acquire)
    }

    /// Total records read.
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }

    /// Records written but not yet read (or discarded by an abort).
    pub fn backlog(&self) -> u64 {
        // Load emitted first so a concurrent read can't make it overtake.
        let emitted = self.emitted_count();
        self.collected_count().saturating_sub(emitted)
    }

    /// Visit every group observed so far with
    /// `(group, collected, emitted, tags, dimensions)`.
    pub fn read_group_stats(&self, mut visit: impl FnMut(&GroupId, u64, u64, &Tags, &[String])) {
        let groups = self.state.lock().groups.clone();
        for (group, stat) in &groups {
            visit(group, stat.collected, stat.emitted, &stat.tags, &stat.dimensions);
        }
    }

    /// Copy of the per-group counters.
    pub fn group_stats(&self) -> IndexMap<GroupId, GroupStat> {
        self.state.lock().groups.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn conduit(capacity: usize) -> Conduit {
        Conduit::new("task", "a", "b", StreamType::Stream, capacity)
    }

    fn record(group: &str, n: i64) -> Record {
        let mut tags = Tags::new();
        tags.insert("host".into(), group.into());
        Record::grouped(vec!["host".into()], tags, json!(n))
    }

    #[test]
    fn test_fifo_and_end_of_stream() {
        let c = conduit(4);
        for i in 0..3 {
            c.write(record("a", i)).unwrap();
        }
        c.close();
        let read: Vec<_> = std::iter::from_fn(|| c.read()).map(|r| r.payload).collect();
        assert_eq!(read, vec![json!(0), json!(1), json!(2)]);
        assert!(c.read().is_none());
    }

    #[test]
    fn test_write_after_close_fails() {
        let c = conduit(1);
        c.close();
        c.close();
        assert!(matches!(c.write(record("a", 0)), Err(ConduitError::Closed(_))));
    }

    #[test]
    fn test_abort_after_close_is_harmless() {
        let c = conduit(2);
        c.write(record("a", 0)).unwrap();
        c.close();
        assert_eq!(c.read().unwrap().payload, json!(0));
        c.abort();
        c.abort();
        assert!(c.read().is_none());
        assert_eq!(c.collected_count(), 1);
        assert_eq!(c.emitted_count(), 1);
    }

    #[test]
    fn test_write_blocks_at_capacity_until_read() {
        let c = Arc::new(conduit(2));
        c.write(record("a", 0)).unwrap();
        c.write(record("a", 1)).unwrap();

        let (tx, rx) = mpsc::channel();
        let writer = {
            let c = c.clone();
            thread::spawn(move || {
                let res = c.write(record("a", 2));
                tx.send(()).unwrap();
                res
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(c.read().is_some());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        writer.join().unwrap().unwrap();
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_abort_unblocks_pending_writer() {
        let c = Arc::new(conduit(1));
        c.write(record("a", 0)).unwrap();

        let writer = {
            let c = c.clone();
            thread::spawn(move || c.write(record("a", 1)))
        };
        thread::sleep(Duration::from_millis(50));
        c.abort();

        let err = writer.join().unwrap().unwrap_err();
        assert!(err.is_aborted());
        assert!(c.is_empty());
    }

    #[test]
    fn test_abort_unblocks_pending_reader() {
        let c = Arc::new(conduit(1));
        let reader = {
            let c = c.clone();
            thread::spawn(move || c.read())
        };
        thread::sleep(Duration::from_millis(50));
        c.abort();
        assert!(reader.join().unwrap().is_none());
    }

    #[test]
    fn test_group_stats() {
        let c = conduit(10);
        for i in 0..3 {
            c.write(record("g1", i)).unwrap();
        }
        for i in 0..2 {
            c.write(record("g2", i)).unwrap();
        }
        c.read().unwrap();

        let mut seen = Vec::new();
        c.read_group_stats(|g, collected, emitted, tags, dims| {
            seen.push((g.to_string(), collected, emitted, tags["host"].clone(), dims.to_vec()));
        });
        assert_eq!(
            seen,
            vec![
                ("host=g1".to_string(), 3, 1, "g1".to_string(), vec!["host".to_string()]),
                ("host=g2".to_string(), 2, 0, "g2".to_string(), vec!["host".to_string()]),
            ]
        );
        assert_eq!(c.backlog(), 4);
    }

    proptest! {
        #[test]
        fn emitted_never_exceeds_collected(groups in proptest::collection::vec(0u8..4, 1..40)) {
            let c = Arc::new(conduit(3));
            let producer = {
                let c = c.clone();
                let groups = groups.clone();
                thread::spawn(move || {
                    for (i, g) in groups.iter().enumerate() {
                        c.write(record(&g.to_string(), i as i64)).unwrap();
                    }
                    c.close();
                })
            };
            while c.read().is_some() {
                prop_assert!(c.emitted_count() <= c.collected_count());
                for stat in c.group_stats().values() {
                    prop_assert!(stat.emitted <= stat.collected);
                }
            }
            producer.join().unwrap();

            prop_assert_eq!(c.collected_count(), groups.len() as u64);
            prop_assert_eq!(c.emitted_count(), c.collected_count());
            for stat in c.group_stats().values() {
                prop_assert_eq!(stat.emitted, stat.collected);
            }
        }
    }
}

//! Node runtime.
//!
//! A [`Node`] wraps one pipeline stage: it owns the conduits to its
//! children, references the conduits from its parents, runs the kind's run
//! routine on its own thread and records the outcome exactly once.
//!
//! When the run routine exits, in order:
//! 1. every output conduit is closed;
//! 2. on failure (returned error or panic) every input conduit is aborted
//!    so blocked parents unwind, and the fault is logged;
//! 3. the outcome is delivered to the node's completion cell.

use crate::core::context::RunContext;
use crate::core::error::{ConduitError, FlowError, FlowResult, RunFault, SnapshotError};
use crate::core::node::NodeKind;
use crate::core::types::{Fields, GroupId, StreamType, Tags};
use crate::execution::completion::CompletionCell;
use crate::execution::fault::{self, RunScope};
use crate::execution::task::TaskEnv;
use crate::graph::conduit::Conduit;
use crate::graph::dot::{self, DotStyle};
use crate::metrics::max_duration::MaxDuration;
use crate::metrics::registry::{StatMap, StatsKey};
use crate::metrics::timer::Timer;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

/// Statistic holding the longest observed per-record execution time.
pub const STAT_AVG_EXEC_TIME: &str = "avg_exec_time";

/// Outcome of a node's run routine.
pub type NodeOutcome = Result<(), RunFault>;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed, no conduits yet.
    Created,
    /// At least one conduit attached.
    Linked,
    /// Run routine launched.
    Running,
    /// Run routine returned without error.
    Succeeded,
    /// Run routine returned an error or panicked.
    Failed,
}

impl NodeState {
    /// Whether the run routine has exited.
    pub fn is_terminated(&self) -> bool {
        matches!(self, NodeState::Succeeded | NodeState::Failed)
    }
}

/// Per-group statistics reported by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStats {
    /// Reportable counters, currently only `emitted`.
    pub fields: Fields,
    /// Tags last seen for the group.
    pub tags: Tags,
    /// Dimensions last seen for the group.
    pub dimensions: Vec<String>,
}

struct Output {
    child: String,
    conduit: Arc<Conduit>,
}

struct StatsHandle {
    key: Option<StatsKey>,
    map: Arc<StatMap>,
    exec_time: Arc<MaxDuration>,
}

/// One pipeline stage in an executing graph.
pub struct Node {
    name: String,
    kind: Arc<dyn NodeKind>,
    env: Arc<TaskEnv>,
    parents: RwLock<Vec<Weak<Node>>>,
    children: RwLock<Vec<Weak<Node>>>,
    ins: RwLock<Vec<Arc<Conduit>>>,
    outs: RwLock<Vec<Output>>,
    state: Arc<Mutex<NodeState>>,
    completion: Arc<CompletionCell<NodeOutcome>>,
    started: AtomicBool,
    stopped: AtomicBool,
    stats: Mutex<Option<StatsHandle>>,
}

impl Node {
    /// Create an unlinked node.
    pub fn new(name: impl Into<String>, kind: Arc<dyn NodeKind>, env: Arc<TaskEnv>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind,
            env,
            parents: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            ins: RwLock::new(Vec::new()),
            outs: RwLock::new(Vec::new()),
            state: Arc::new(Mutex::new(NodeState::Created)),
            completion: Arc::new(CompletionCell::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stats: Mutex::new(None),
        })
    }

    /// Node name, unique within its task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind name of the wrapped stage.
    pub fn kind(&self) -> &str {
        self.kind.kind()
    }

    /// Stream type written to children.
    pub fn provides(&self) -> StreamType {
        self.kind.provides()
    }

    /// Stream type accepted from parents.
    pub fn wants(&self) -> StreamType {
        self.kind.wants()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        *self.state.lock()
    }

    /// Conduits from this node's parents.
    pub fn inputs(&self) -> Vec<Arc<Conduit>> {
        self.ins.read().clone()
    }

    /// Conduits to this node's children, in link order.
    pub fn outputs(&self) -> Vec<Arc<Conduit>> {
        self.outs.read().iter().map(|o| o.conduit.clone()).collect()
    }

    /// Parents that are still alive.
    pub fn parents(&self) -> Vec<Arc<Node>> {
        self.parents.read().iter().filter_map(Weak::upgrade).collect()
    }

    /// Children that are still alive.
    pub fn children(&self) -> Vec<Arc<Node>> {
        self.children.read().iter().filter_map(Weak::upgrade).collect()
    }

    /// Live statistics, once the node has been started.
    pub fn stats(&self) -> Option<Arc<StatMap>> {
        self.stats.lock().as_ref().map(|h| h.map.clone())
    }

    /// Running maximum of per-record execution time, once started.
    pub fn exec_time(&self) -> Option<Arc<MaxDuration>> {
        self.stats.lock().as_ref().map(|h| h.exec_time.clone())
    }

    // ========================================================================
    // Linking
    // ========================================================================

    fn add_parent_edge(&self, conduit: Arc<Conduit>) {
        self.ins.write().push(conduit);
        self.mark_linked();
    }

    fn mark_linked(&self) {
        let mut state = self.state.lock();
        if *state == NodeState::Created {
            *state = NodeState::Linked;
        }
    }

    /// Create a conduit from this node to `child`.
    ///
    /// The conduit carries this node's output type and is registered as an
    /// input on `child` and an output here. Nothing is created if the types
    /// disagree or either node is already running.
    pub fn add_child(&self, child: &Node) -> FlowResult<Arc<Conduit>> {
        if self.provides() != child.wants() {
            return Err(FlowError::LinkTypeMismatch {
                parent: self.name.clone(),
                child: child.name.clone(),
                provides: self.provides(),
                wants: child.wants(),
            });
        }
        for node in [self, child] {
            if node.started.load(Ordering::Acquire) {
                return Err(FlowError::AlreadyStarted(node.name.clone()));
            }
        }

        let conduit = Arc::new(Conduit::new(
            &self.env.task_name,
            &self.name,
            &child.name,
            self.provides(),
            self.env.config.conduit_capacity,
        ));
        child.add_parent_edge(conduit.clone());
        self.outs.write().push(Output {
            child: child.name.clone(),
            conduit: conduit.clone(),
        });
        self.mark_linked();
        Ok(conduit)
    }

    /// Link `child` below this node and record the parent/child relation.
    ///
    /// Linking the same pair twice creates two conduits.
    pub fn link_child(self: &Arc<Self>, child: &Arc<Node>) -> FlowResult<()> {
        self.add_child(child)?;
        self.children.write().push(Arc::downgrade(child));
        child.parents.write().push(Arc::downgrade(self));
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register statistics and launch the run routine on its own thread.
    ///
    /// Returns as soon as the thread is spawned. `snapshot`, when present
    /// and non-empty, is restored into the kind before it runs.
    pub fn start(&self, snapshot: Option<Vec<u8>>) -> FlowResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(FlowError::AlreadyStarted(self.name.clone()));
        }
        fault::install_panic_hook();

        let mut tags = Tags::new();
        tags.insert("task".to_string(), self.env.task_name.clone());
        tags.insert("node".to_string(), self.name.clone());
        tags.insert("type".to_string(), self.env.task_type.to_string());
        tags.insert("kind".to_string(), self.kind().to_string());
        let (key, map) = self.env.registry.register(&self.env.config.stats_category, tags);
        let exec_time = Arc::new(MaxDuration::new());
        map.set(STAT_AVG_EXEC_TIME, exec_time.clone());
        let timer = self.env.timing.new_timer(exec_time.clone());
        *self.stats.lock() = Some(StatsHandle {
            key: Some(key),
            map: map.clone(),
            exec_time,
        });
        *self.state.lock() = NodeState::Running;

        let worker = Worker {
            name: self.name.clone(),
            kind: self.kind.clone(),
            ins: self.inputs(),
            outs: self.outputs(),
            snapshot,
            timer,
            stats: map,
            trace_limit: self.env.config.trace_limit,
            state: self.state.clone(),
            completion: self.completion.clone(),
        };

        log::debug!("starting node {} ({})", self.name, self.kind());
        let spawned = thread::Builder::new()
            .name(format!("node-{}", self.name))
            .spawn(move || worker.run());
        if let Err(e) = spawned {
            let fault = RunFault::returned(&self.name, format!("failed to spawn: {}", e));
            terminate(
                &self.name,
                &self.inputs(),
                &self.outputs(),
                &self.state,
                &self.completion,
                Err(fault),
            );
            return Err(FlowError::Spawn {
                node: self.name.clone(),
                error: e.to_string(),
            });
        }
        Ok(())
    }

    /// Invoke the kind's stop hook and deregister statistics.
    ///
    /// Idempotent. Never interrupts a running routine.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("stopping node {}", self.name);
        self.kind.stop();
        if let Some(key) = self.stats.lock().as_mut().and_then(|h| h.key.take()) {
            self.env.registry.unregister(&key);
        }
    }

    /// Block until the run routine has finished and return its outcome.
    ///
    /// Every call, from any thread, returns the same outcome.
    pub fn await_completion(&self) -> FlowResult<()> {
        if !self.started.load(Ordering::Acquire) {
            return Err(FlowError::NotStarted(self.name.clone()));
        }
        self.completion.wait().map_err(FlowError::from)
    }

    /// Outcome if the node has finished, without blocking.
    pub fn try_outcome(&self) -> Option<NodeOutcome> {
        self.completion.try_get()
    }

    /// Serialize the kind's accumulated state.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        self.kind.snapshot()
    }

    /// Restore the kind's state from a blob produced by `snapshot`.
    pub fn restore(&self, blob: &[u8]) -> Result<(), SnapshotError> {
        self.kind.restore(blob)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Records consumed by this node across all of its inputs.
    pub fn collected_count(&self) -> u64 {
        self.ins.read().iter().map(|c| c.emitted_count()).sum()
    }

    /// Per-group emitted counts, taken from the first output conduit only.
    ///
    /// A node's emitted count is the collected count of its output. Nodes
    /// without outputs report nothing.
    pub fn stats_by_group(&self) -> IndexMap<GroupId, NodeStats> {
        let mut stats = IndexMap::new();
        // Only the first child is sampled; siblings are assumed to see the same groups.
        if let Some(first) = self.outs.read().first() {
            first
                .conduit
                .read_group_stats(|group, collected, _emitted, tags, dims| {
                    let mut fields = Fields::new();
                    fields.insert("emitted".to_string(), collected as i64);
                    stats.insert(
                        group.clone(),
                        NodeStats {
                            fields,
                            tags: tags.clone(),
                            dimensions: dims.to_vec(),
                        },
                    );
                });
        }
        stats
    }

    /// Append this node's DOT fragment to `buf`.
    pub fn edot(&self, buf: &mut String, labels: bool) {
        let stats = self.stats().map(|m| m.values()).unwrap_or_default();
        let edges: Vec<(String, u64)> = self
            .outs
            .read()
            .iter()
            .map(|o| (o.child.clone(), o.conduit.collected_count()))
            .collect();
        dot::render_node(buf, &self.name, &stats, &edges, DotStyle::from_labels(labels));
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("inputs", &self.ins.read().len())
            .field("outputs", &self.outs.read().len())
            .finish()
    }
}

/// Everything the node thread needs, moved onto it at start.
struct Worker {
    name: String,
    kind: Arc<dyn NodeKind>,
    ins: Vec<Arc<Conduit>>,
    outs: Vec<Arc<Conduit>>,
    snapshot: Option<Vec<u8>>,
    timer: Timer,
    stats: Arc<StatMap>,
    trace_limit: usize,
    state: Arc<Mutex<NodeState>>,
    completion: Arc<CompletionCell<NodeOutcome>>,
}

impl Worker {
    fn run(mut self) {
        let result = {
            let _scope = RunScope::enter();
            panic::catch_unwind(AssertUnwindSafe(|| self.execute()))
        };

        let outcome = match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) if is_abort(&err) => Err(RunFault::aborted(&self.name, format!("{:#}", err))),
            Ok(Err(err)) => Err(RunFault::returned(&self.name, format!("{:#}", err))),
            Err(payload) => Err(RunFault::panicked(
                &self.name,
                fault::panic_message(&*payload),
                fault::take_trace(self.trace_limit),
            )),
        };
        terminate(
            &self.name,
            &self.ins,
            &self.outs,
            &self.state,
            &self.completion,
            outcome,
        );
    }

    fn execute(&mut self) -> anyhow::Result<()> {
        let snapshot = self.snapshot.as_deref().filter(|s| !s.is_empty());
        if let Some(blob) = snapshot {
            self.kind.restore(blob)?;
        }
        let mut ctx = RunContext::new(
            &self.name,
            &self.ins,
            &self.outs,
            snapshot,
            &mut self.timer,
            &self.stats,
        );
        self.kind.run(&mut ctx)
    }
}

/// Exit steps shared by every way a node can end: close outputs, abort
/// inputs and log on failure, then publish the outcome.
fn terminate(
    name: &str,
    ins: &[Arc<Conduit>],
    outs: &[Arc<Conduit>],
    state: &Mutex<NodeState>,
    completion: &CompletionCell<NodeOutcome>,
    outcome: NodeOutcome,
) {
    for out in outs {
        out.close();
    }

    if let Err(fault) = &outcome {
        for input in ins {
            input.abort();
        }
        if fault.is_abort() {
            log::debug!("node {} unwound: {}", name, fault);
        } else {
            log::error!("node {} failed: {}", name, fault);
        }
    }

    *state.lock() = if outcome.is_ok() {
        NodeState::Succeeded
    } else {
        NodeState::Failed
    };
    completion.resolve(outcome);
}

fn is_abort(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ConduitError>() {
        Some(e) => e.is_aborted(),
        None => matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::Conduit(ConduitError::Aborted(_)))
        ),
    }
}

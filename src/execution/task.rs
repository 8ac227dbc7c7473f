//! Task orchestration.
//!
//! A [`TaskGraph`] owns the nodes of one task together with the environment
//! they share: the task's identity, the engine configuration, the
//! statistics registry and the timing service.

use crate::core::config::EngineConfig;
use crate::core::error::{FlowError, FlowResult};
use crate::core::node::NodeKind;
use crate::core::snapshot::TaskSnapshot;
use crate::core::types::StreamType;
use crate::execution::node::Node;
use crate::graph::dot;
use crate::metrics::registry::{MemoryRegistry, StatsRegistry};
use crate::metrics::timer::{SampledTiming, TimingService};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Environment shared by every node of a task.
pub struct TaskEnv {
    /// Name of the owning task.
    pub task_name: String,
    /// Stream type of the task as a whole.
    pub task_type: StreamType,
    /// Engine settings every node reads.
    pub config: EngineConfig,
    /// Where nodes file their live statistics.
    pub registry: Arc<dyn StatsRegistry>,
    /// Source of per-node execution timers.
    pub timing: Arc<dyn TimingService>,
}

impl TaskEnv {
    /// Create an environment with an in-memory registry and timing sampled
    /// as configured.
    pub fn new(task_name: impl Into<String>, task_type: StreamType, config: EngineConfig) -> Self {
        let timing = Arc::new(SampledTiming::new(config.timing_sample_every));
        Self {
            task_name: task_name.into(),
            task_type,
            config,
            registry: MemoryRegistry::new_shared(),
            timing,
        }
    }

    /// Use a different statistics registry.
    pub fn with_registry(mut self, registry: Arc<dyn StatsRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use a different timing service.
    pub fn with_timing(mut self, timing: Arc<dyn TimingService>) -> Self {
        self.timing = timing;
        self
    }
}

impl std::fmt::Debug for TaskEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEnv")
            .field("task_name", &self.task_name)
            .field("task_type", &self.task_type)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The nodes of one task, in insertion order.
#[derive(Debug)]
pub struct TaskGraph {
    env: Arc<TaskEnv>,
    nodes: IndexMap<String, Arc<Node>>,
}

impl TaskGraph {
    /// Create an empty graph. Fails if the configuration is invalid.
    pub fn new(env: TaskEnv) -> FlowResult<Self> {
        env.config.validate()?;
        Ok(Self {
            env: Arc::new(env),
            nodes: IndexMap::new(),
        })
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.env.task_name
    }

    /// Environment shared by the task's nodes.
    pub fn env(&self) -> &Arc<TaskEnv> {
        &self.env
    }

    /// Add a node under a unique name.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: Arc<dyn NodeKind>,
    ) -> FlowResult<Arc<Node>> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(FlowError::DuplicateNode(name));
        }
        let node = Node::new(name.clone(), kind, self.env.clone());
        self.nodes.insert(name, node.clone());
        Ok(node)
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&Arc<Node>> {
        self.nodes.get(name)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn get(&self, name: &str) -> FlowResult<&Arc<Node>> {
        self.nodes
            .get(name)
            .ok_or_else(|| FlowError::NodeNotFound(name.to_string()))
    }

    /// Link `parent` to `child` by name.
    pub fn link(&self, parent: &str, child: &str) -> FlowResult<()> {
        let parent = self.get(parent)?;
        let child = self.get(child)?;
        parent.link_child(child)
    }

    /// Start every node, restoring any state recorded in `snapshot`.
    ///
    /// Children are started before their parents so nothing is written
    /// before its reader exists. If a node fails to start, the nodes already
    /// started are left running; call [`TaskGraph::stop`] and
    /// [`TaskGraph::wait`] to clean up.
    pub fn start(&self, snapshot: &TaskSnapshot) -> FlowResult<()> {
        log::info!("starting task {} with {} nodes", self.name(), self.nodes.len());
        for node in self.nodes.values().rev() {
            node.start(snapshot.get(node.name()).map(<[u8]>::to_vec))?;
        }
        Ok(())
    }

    /// Wait for every node to finish.
    ///
    /// Returns the error of the node that actually failed when there is
    /// one; faults that only echo an abort from downstream are reported
    /// only if nothing else failed.
    pub fn wait(&self) -> FlowResult<()> {
        let mut first: Option<FlowError> = None;
        let mut root_cause: Option<FlowError> = None;
        for node in self.nodes.values() {
            if let Err(e) = node.await_completion() {
                let is_echo = matches!(&e, FlowError::Run(fault) if fault.is_abort());
                if !is_echo && root_cause.is_none() {
                    root_cause = Some(e.clone());
                }
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
        match root_cause.or(first) {
            Some(e) => {
                log::error!("task {} failed: {}", self.name(), e);
                Err(e)
            }
            None => {
                log::info!("task {} finished", self.name());
                Ok(())
            }
        }
    }

    /// Stop every node.
    pub fn stop(&self) {
        for node in self.nodes.values() {
            node.stop();
        }
    }

    /// Collect the snapshot of every node that has state to save.
    pub fn snapshot(&self) -> FlowResult<TaskSnapshot> {
        let mut snapshot = TaskSnapshot::new();
        for node in self.nodes.values() {
            let blob = node.snapshot()?;
            if !blob.is_empty() {
                snapshot.node_snapshots.insert(node.name().to_string(), blob);
            }
        }
        Ok(snapshot)
    }

    /// Render the task as a DOT `digraph`.
    ///
    /// Nodes are visited breadth-first from the nodes without parents.
    pub fn dot(&self, labels: bool) -> String {
        let mut body = String::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<Arc<Node>> = self
            .nodes
            .values()
            .filter(|n| n.inputs().is_empty())
            .cloned()
            .collect();

        while let Some(node) = queue.pop_front() {
            let Some(name) = self.nodes.get_key_value(node.name()).map(|(k, _)| k.as_str()) else {
                continue;
            };
            if !seen.insert(name) {
                continue;
            }
            node.edot(&mut body, labels);
            queue.extend(node.children());
        }
        dot::wrap_digraph(self.name(), &body)
    }
}

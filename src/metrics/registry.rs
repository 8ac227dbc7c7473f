//! Statistics registry.
//!
//! Nodes register a live statistics map when they start and remove it
//! when they stop. The registry is injected into the graph rather than
//! living in a global, so tests and embedders can supply their own.

use crate::core::types::Tags;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A live statistic that can render its current value.
pub trait StatVar: Send + Sync {
    /// Current value formatted for display.
    fn value_string(&self) -> String;
}

/// Atomic integer statistic.
#[derive(Debug, Default)]
pub struct IntVar(AtomicI64);

impl IntVar {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the value.
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Replace the value.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl StatVar for IntVar {
    fn value_string(&self) -> String {
        self.get().to_string()
    }
}

/// Live statistics of one registered entity, ordered by key.
#[derive(Default)]
pub struct StatMap {
    vars: RwLock<BTreeMap<String, Arc<dyn StatVar>>>,
}

impl StatMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a statistic.
    pub fn set(&self, key: impl Into<String>, var: Arc<dyn StatVar>) {
        self.vars.write().insert(key.into(), var);
    }

    /// Look up a statistic.
    pub fn get(&self, key: &str) -> Option<Arc<dyn StatVar>> {
        self.vars.read().get(key).cloned()
    }

    /// Visit every statistic in key order.
    pub fn for_each(&self, mut visit: impl FnMut(&str, &dyn StatVar)) {
        for (key, var) in self.vars.read().iter() {
            visit(key, var.as_ref());
        }
    }

    /// Render every statistic in key order.
    pub fn values(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.for_each(|k, v| out.push((k.to_string(), v.value_string())));
        out
    }

    /// Number of statistics.
    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    /// Whether the map holds no statistics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for StatMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values()).finish()
    }
}

/// Handle identifying a registered statistics entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatsKey(Uuid);

impl StatsKey {
    /// Create a new random key.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StatsKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where live statistics are registered.
pub trait StatsRegistry: Send + Sync {
    /// Register a new entry and return its key and live map.
    fn register(&self, category: &str, tags: Tags) -> (StatsKey, Arc<StatMap>);

    /// Remove an entry. Unknown keys are ignored.
    fn unregister(&self, key: &StatsKey);
}

/// One registered entry.
#[derive(Debug, Clone)]
pub struct StatsEntry {
    /// Category the entry was registered under.
    pub category: String,
    /// Identifying tags.
    pub tags: Tags,
    /// Live statistics.
    pub stats: Arc<StatMap>,
}

/// In-process registry keeping entries in registration order.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Mutex<IndexMap<StatsKey, StatsEntry>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every live entry.
    pub fn entries(&self) -> Vec<StatsEntry> {
        self.entries.lock().values().cloned().collect()
    }

    /// Find the entry whose tag `name` equals `value`.
    pub fn find(&self, name: &str, value: &str) -> Option<StatsEntry> {
        self.entries
            .lock()
            .values()
            .find(|e| e.tags.get(name).map(String::as_str) == Some(value))
            .cloned()
    }
}

impl StatsRegistry for MemoryRegistry {
    fn register(&self, category: &str, tags: Tags) -> (StatsKey, Arc<StatMap>) {
        let key = StatsKey::new();
        let stats = Arc::new(StatMap::new());
        self.entries.lock().insert(
            key,
            StatsEntry {
                category: category.to_string(),
                tags,
                stats: stats.clone(),
            },
        );
        (key, stats)
    }

    fn unregister(&self, key: &StatsKey) {
        self.entries.lock().shift_remove(key);
    }
}

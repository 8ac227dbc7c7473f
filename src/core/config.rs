//! Engine configuration.
//!
//! Settings are fixed per deployment and shared by every node of a task.
//! They can be built in code with the `with_*` setters or loaded from TOML:
//!
//! ```toml
//! conduit_capacity = 500
//! trace_limit = 1024
//! ```

use crate::core::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of records a conduit buffers before writers block.
pub const DEFAULT_CONDUIT_CAPACITY: usize = 1000;

/// Default maximum size in bytes of the stack excerpt kept for a panic.
pub const DEFAULT_TRACE_LIMIT: usize = 512;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Queue capacity of every conduit.
    pub conduit_capacity: usize,
    /// Maximum bytes of stack excerpt captured for a panicking run routine.
    pub trace_limit: usize,
    /// Timers record one out of every N measurements.
    pub timing_sample_every: u64,
    /// Registry category node statistics are filed under.
    pub stats_category: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conduit_capacity: DEFAULT_CONDUIT_CAPACITY,
            trace_limit: DEFAULT_TRACE_LIMIT,
            timing_sample_every: 1,
            stats_category: "nodes".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the conduit capacity.
    pub fn with_conduit_capacity(mut self, capacity: usize) -> Self {
        self.conduit_capacity = capacity;
        self
    }

    /// Set the stack excerpt limit.
    pub fn with_trace_limit(mut self, limit: usize) -> Self {
        self.trace_limit = limit;
        self
    }

    /// Set the timer sampling interval.
    pub fn with_timing_sample_every(mut self, every: u64) -> Self {
        self.timing_sample_every = every;
        self
    }

    /// Set the statistics category.
    pub fn with_stats_category(mut self, category: impl Into<String>) -> Self {
        self.stats_category = category.into();
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> FlowResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| FlowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FlowError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> FlowResult<()> {
        if self.conduit_capacity == 0 {
            return Err(FlowError::Config(
                "conduit_capacity must be at least 1".to_string(),
            ));
        }
        if self.trace_limit == 0 {
            return Err(FlowError::Config(
                "trace_limit must be at least 1".to_string(),
            ));
        }
        if self.timing_sample_every == 0 {
            return Err(FlowError::Config(
                "timing_sample_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.conduit_capacity, 1000);
        assert_eq!(config.trace_limit, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("conduit_capacity = 2").unwrap();
        assert_eq!(config.conduit_capacity, 2);
        assert_eq!(config.trace_limit, DEFAULT_TRACE_LIMIT);
        assert_eq!(config.stats_category, "nodes");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = EngineConfig::from_toml_str("conduit_capacity = 0").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_zero_trace_limit_rejected() {
        let err = EngineConfig::from_toml_str("trace_limit = 0").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
        assert!(EngineConfig::new().with_trace_limit(0).validate().is_err());
        assert!(EngineConfig::new().with_trace_limit(1).validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trace_limit = 64\nstats_category = \"tasks\"").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.trace_limit, 64);
        assert_eq!(config.stats_category, "tasks");
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_conduit_capacity(8)
            .with_trace_limit(128)
            .with_timing_sample_every(10)
            .with_stats_category("edges");
        assert_eq!(config.conduit_capacity, 8);
        assert_eq!(config.trace_limit, 128);
        assert_eq!(config.timing_sample_every, 10);
        assert_eq!(config.stats_category, "edges");
    }
}

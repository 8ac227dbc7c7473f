//! Live node statistics.
//!
//! - [`MaxDuration`]: running maximum of observed execution durations
//! - [`StatsRegistry`]: where nodes file their live statistics while running
//! - [`TimingService`]: hands out timers that feed a duration sink

pub mod max_duration;
pub mod registry;
pub mod timer;

pub use max_duration::MaxDuration;
pub use registry::{IntVar, MemoryRegistry, StatMap, StatVar, StatsEntry, StatsKey, StatsRegistry};
pub use timer::{DurationSink, SampledTiming, Timer, TimingService};

//! Timing instrument for per-record processing.
//!
//! A node-kind run routine calls [`Timer::start`] before handling a record
//! and [`Timer::stop`] after; the elapsed time goes to the timer's sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives measured durations.
pub trait DurationSink: Send + Sync {
    /// Record one measurement.
    fn record(&self, elapsed: Duration);
}

/// Creates timers bound to a sink.
pub trait TimingService: Send + Sync {
    /// Create a timer feeding `sink`.
    fn new_timer(&self, sink: Arc<dyn DurationSink>) -> Timer;
}

/// Timing service that records one out of every `every` measurements.
#[derive(Debug, Clone, Copy)]
pub struct SampledTiming {
    every: u64,
}

impl SampledTiming {
    /// Sample every `every`th measurement (minimum 1).
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for SampledTiming {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TimingService for SampledTiming {
    fn new_timer(&self, sink: Arc<dyn DurationSink>) -> Timer {
        Timer {
            sink: Some(sink),
            every: self.every,
            count: 0,
            started: None,
        }
    }
}

/// Measures spans between `start` and `stop`.
pub struct Timer {
    sink: Option<Arc<dyn DurationSink>>,
    every: u64,
    count: u64,
    started: Option<Instant>,
}

impl Timer {
    /// A timer that measures nothing.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            every: 1,
            count: 0,
            started: None,
        }
    }

    /// Begin a measurement, if this one is sampled.
    pub fn start(&mut self) {
        if self.sink.is_none() {
            return;
        }
        self.count = self.count.wrapping_add(1);
        if (self.count - 1) % self.every == 0 {
            self.started = Some(Instant::now());
        }
    }

    /// End the current measurement and report it.
    pub fn stop(&mut self) {
        if let (Some(started), Some(sink)) = (self.started.take(), &self.sink) {
            sink.record(started.elapsed());
        }
    }

    /// Time `f` as one measurement.
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.start();
        let out = f();
        self.stop();
        out
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("enabled", &self.sink.is_some())
            .field("every", &self.every)
            .field("count", &self.count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Duration>>);

    impl DurationSink for Recorder {
        fn record(&self, elapsed: Duration) {
            self.0.lock().push(elapsed);
        }
    }

    #[test]
    fn test_every_measurement_recorded() {
        let sink = Arc::new(Recorder::default());
        let mut timer = SampledTiming::default().new_timer(sink.clone());
        for _ in 0..3 {
            timer.start();
            timer.stop();
        }
        assert_eq!(sink.0.lock().len(), 3);
    }

    #[test]
    fn test_sampling() {
        let sink = Arc::new(Recorder::default());
        let mut timer = SampledTiming::new(2).new_timer(sink.clone());
        for _ in 0..5 {
            timer.time(|| ());
        }
        assert_eq!(sink.0.lock().len(), 3);
    }

    #[test]
    fn test_stop_without_start() {
        let sink = Arc::new(Recorder::default());
        let mut timer = SampledTiming::default().new_timer(sink.clone());
        timer.stop();
        assert!(sink.0.lock().is_empty());
        Timer::disabled().time(|| ());
    }
}

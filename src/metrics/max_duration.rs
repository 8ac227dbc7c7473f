//! Running-maximum duration metric.

use crate::metrics::registry::StatVar;
use crate::metrics::timer::DurationSink;
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// A duration in nanoseconds that only ever grows.
///
/// A value is stored only if it exceeds the current one. Concurrent
/// writers retry with compare-and-swap, so no writer can regress it.
#[derive(Debug, Default)]
pub struct MaxDuration {
    nanos: AtomicI64,
}

impl MaxDuration {
    /// Create a metric starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current maximum in nanoseconds.
    pub fn get(&self) -> i64 {
        self.nanos.load(Ordering::Acquire)
    }

    /// Current maximum as a duration.
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.get().max(0) as u64)
    }

    /// Store `value` if it is greater than the current maximum.
    pub fn set(&self, value: i64) {
        let backoff = Backoff::new();
        loop {
            let current = self.get();
            if value <= current {
                return;
            }
            if self
                .nanos
                .compare_exchange_weak(current, value, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            backoff.spin();
        }
    }

    /// Store `d` if it is longer than the current maximum.
    pub fn set_duration(&self, d: Duration) {
        self.set(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
    }
}

impl StatVar for MaxDuration {
    fn value_string(&self) -> String {
        format!("{:?}", self.duration())
    }
}

impl DurationSink for MaxDuration {
    fn record(&self, elapsed: Duration) {
        self.set_duration(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_never_decreases() {
        let m = MaxDuration::new();
        m.set(10);
        m.set(3);
        assert_eq!(m.get(), 10);
        m.set(11);
        assert_eq!(m.get(), 11);
    }

    #[test]
    fn test_negative_values_ignored() {
        let m = MaxDuration::new();
        m.set(-5);
        assert_eq!(m.get(), 0);
    }

    #[test]
    fn test_renders_as_duration() {
        let m = MaxDuration::new();
        m.set_duration(Duration::from_millis(3));
        assert_eq!(m.value_string(), "3ms");
    }

    proptest! {
        #[test]
        fn concurrent_sets_converge_to_max(values in proptest::collection::vec(any::<i64>(), 1..64)) {
            let m = Arc::new(MaxDuration::new());
            let handles: Vec<_> = values
                .chunks(8)
                .map(|chunk| {
                    let m = m.clone();
                    let chunk = chunk.to_vec();
                    std::thread::spawn(move || {
                        for v in chunk {
                            m.set(v);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            let expected = values.iter().copied().max().unwrap_or(0).max(0);
            prop_assert_eq!(m.get(), expected);
        }
    }
}

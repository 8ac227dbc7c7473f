//! Compute-once completion cell.
//!
//! Holds at most one value. The first `resolve` wins; every later reader,
//! blocking or not, sees that same value.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A single-slot cell resolved exactly once.
#[derive(Debug)]
pub struct CompletionCell<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T: Clone> CompletionCell<T> {
    /// Create an unresolved cell.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `value` if the cell is still empty.
    ///
    /// Returns `false` if the cell was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        drop(slot);
        self.ready.notify_all();
        true
    }

    /// Block until the cell is resolved and return its value.
    pub fn wait(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.ready.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready.wait_while_for(&mut slot, |s| s.is_none(), timeout);
        }
        slot.clone()
    }

    /// The value, if the cell has been resolved.
    pub fn try_get(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    /// Whether the cell has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T: Clone> Default for CompletionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

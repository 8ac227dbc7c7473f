//! Panic interception for run routines.
//!
//! Node threads run their routine under `catch_unwind`. To report where a
//! panic happened, a chained panic hook records a backtrace at the panic
//! site for threads that are executing a run routine; the node picks it up
//! after unwinding and keeps at most `limit` bytes of it.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic;
use std::sync::Once;

thread_local! {
    static IN_RUN_ROUTINE: Cell<bool> = const { Cell::new(false) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Install the trace-recording hook once per process, chaining the existing one.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_RUN_ROUTINE.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|t| *t.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// Marks the current thread as running a routine for the guard's lifetime.
pub struct RunScope(());

impl RunScope {
    /// Mark the current thread until the guard drops.
    pub fn enter() -> Self {
        IN_RUN_ROUTINE.with(|f| f.set(true));
        PANIC_TRACE.with(|t| t.borrow_mut().take());
        RunScope(())
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        IN_RUN_ROUTINE.with(|f| f.set(false));
    }
}

/// Take the trace recorded for the last panic on this thread, or capture
/// one here if the hook did not run. Truncated to `limit` bytes.
pub fn take_trace(limit: usize) -> String {
    let trace = PANIC_TRACE
        .with(|t| t.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string());
    truncate(trace, limit)
}

/// Extract the message of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "run routine panicked".to_string()
    }
}

fn truncate(mut s: String, limit: usize) -> String {
    if s.len() > limit {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");

        let n = 3;
        let payload = panic::catch_unwind(|| panic!("formatted {}", n)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 3");

        let payload = panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(&*payload), "run routine panicked");
    }

    #[test]
    fn test_trace_is_bounded() {
        install_panic_hook();
        let result = {
            let _scope = RunScope::enter();
            panic::catch_unwind(|| panic!("boom"))
        };
        assert!(result.is_err());
        let trace = take_trace(512);
        assert!(!trace.is_empty());
        assert!(trace.len() <= 512);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let s = "é".repeat(10);
        let t = truncate(s, 5);
        assert_eq!(t, "éé");
    }
}

//! Run-scoped failure counter.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Tolerance for document fetch failures across a whole run.
///
/// The run must stop once more than `max` failures were recorded: with
/// `max = 2` the second failure is tolerated and the third one trips it.
#[derive(Debug)]
pub struct ErrorBudget {
    max: usize,
    failures: AtomicUsize,
}

impl ErrorBudget {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            failures: AtomicUsize::new(0),
        }
    }

    /// Records one failure. Returns `true` if the budget is now exceeded.
    pub fn record_failure(&self) -> bool {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        failures > self.max
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn exceeded(&self) -> bool {
        self.failures() > self.max
    }
}

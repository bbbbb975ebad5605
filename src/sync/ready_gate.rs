//! One-shot startup handoff between the worker and the caller.
//!
//! The worker reports exactly one typed result through a [`ReadyReporter`];
//! the caller reads it once through [`ReadyGate::wait`] with a bounded wait.
//! A reporter dropped without reporting (for example when the worker thread
//! unwinds) fills the gate with [`Error::ConnectionClosed`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

// ============================================================================
// Shared Slot
// ============================================================================

enum Slot<T> {
    Waiting,
    Ready(Result<T>),
    Taken,
}

struct GateShared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> GateShared<T> {
    fn fill(&self, result: Result<T>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Waiting) {
            *slot = Slot::Ready(result);
            self.ready.notify_all();
        }
    }
}

// ============================================================================
// ReadyGate
// ============================================================================

/// Caller side of the startup handoff.
pub struct ReadyGate<T> {
    shared: Arc<GateShared<T>>,
}

impl<T> ReadyGate<T> {
    /// Creates a gate and its reporter.
    #[must_use]
    pub fn new() -> (Self, ReadyReporter<T>) {
        let shared = Arc::new(GateShared {
            slot: Mutex::new(Slot::Waiting),
            ready: Condvar::new(),
        });

        let gate = Self {
            shared: Arc::clone(&shared),
        };
        let reporter = ReadyReporter {
            shared: Some(shared),
        };

        (gate, reporter)
    }

    /// Waits up to `timeout` for the reported result.
    ///
    /// Returns `None` if nothing was reported in time.
    pub fn wait(self, timeout: Duration) -> Option<Result<T>> {
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Waiting) {
            self.shared
                .ready
                .wait_while_for(&mut slot, |s| matches!(s, Slot::Waiting), timeout);
        }

        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => Some(result),
            Slot::Waiting | Slot::Taken => None,
        }
    }
}

// ============================================================================
// ReadyReporter
// ============================================================================

/// Worker side of the startup handoff.
pub struct ReadyReporter<T> {
    shared: Option<Arc<GateShared<T>>>,
}

impl<T> ReadyReporter<T> {
    /// Reports the startup outcome. Only the first report is kept.
    pub fn report(mut self, result: Result<T>) {
        if let Some(shared) = self.shared.take() {
            shared.fill(result);
        }
    }
}

impl<T> Drop for ReadyReporter<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.fill(Err(Error::ConnectionClosed));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

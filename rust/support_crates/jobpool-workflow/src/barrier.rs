//! Completion barrier: a counter of outstanding workers that a coordinator can wait
//! on.
//!
//! Each participant is represented by a [`BarrierGuard`] obtained from
//! [`CompletionBarrier::register`]. Dropping the guard releases the participant, so
//! the release happens exactly once on every exit path: normal return, early
//! return with an error, or unwinding from a panic.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A counter of outstanding participants with a blocking wait for zero.
///
/// Cloning yields another handle to the same counter.
#[derive(Clone, Default)]
pub struct CompletionBarrier {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    outstanding: Mutex<usize>,
    zero: Condvar,
}

impl CompletionBarrier {
    /// Creates a barrier with no outstanding participants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one participant and returns the guard that releases it.
    ///
    /// Registration must happen before the participant starts running, so that a
    /// concurrent [`wait`](Self::wait) cannot observe zero too early.
    pub fn register(&self) -> BarrierGuard {
        *self.lock() += 1;
        BarrierGuard {
            barrier: self.clone(),
        }
    }

    /// Returns the number of participants that have not been released yet.
    pub fn outstanding(&self) -> usize {
        *self.lock()
    }

    /// Blocks until every registered participant has been released.
    ///
    /// Returns immediately if nothing is outstanding.
    pub fn wait(&self) {
        let mut outstanding = self.lock();
        while *outstanding != 0 {
            outstanding = self
                .inner
                .zero
                .wait(outstanding)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Blocks until every participant has been released or `timeout` elapses.
    ///
    /// Returns `true` if the counter reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let outstanding = self.lock();
        let (outstanding, _) = self
            .inner
            .zero
            .wait_timeout_while(outstanding, timeout, |n| *n != 0)
            .unwrap_or_else(|e| e.into_inner());
        *outstanding == 0
    }

    fn release(&self) {
        let mut outstanding = self.lock();
        assert!(*outstanding > 0, "barrier released more times than registered");
        *outstanding -= 1;
        if *outstanding == 0 {
            drop(outstanding);
            self.inner.zero.notify_all();
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases one participant of a [`CompletionBarrier`] when dropped.
#[must_use = "dropping the guard releases the participant immediately"]
pub struct BarrierGuard {
    barrier: CompletionBarrier,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.barrier.release();
    }
}

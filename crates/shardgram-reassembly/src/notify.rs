//! Readiness wakeups for blocking readers.
//!
//! Workers raise an atomic flag after completing a group; the condvar is only
//! signalled when a reader is actually parked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub(crate) struct ReadyNotifier {
    pending: AtomicBool,
    sleepers: Mutex<usize>,
    condvar: Condvar,
}

impl ReadyNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn notify(&self) {
        self.pending.store(true, Ordering::Release);
        if *self.sleepers.lock() > 0 {
            self.condvar.notify_all();
        }
    }

    /// Wait until notified or `timeout` passes. Returns true if a
    /// notification was consumed.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.pending.swap(false, Ordering::Acquire) {
            return true;
        }

        let mut sleepers = self.sleepers.lock();
        if self.pending.swap(false, Ordering::Acquire) {
            return true;
        }
        *sleepers += 1;
        let result = self.condvar.wait_for(&mut sleepers, timeout);
        *sleepers -= 1;

        self.pending.swap(false, Ordering::Acquire) || !result.timed_out()
    }
}

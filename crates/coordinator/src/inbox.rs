//! Attach/detach event inbox
//!
//! The bus-event source appends to two queues (recently removed, recently
//! attached) and signals; the transition engine waits on the signal and
//! consumes the queues. Both sides go through the same lock, and cancellation
//! is set under that lock too, so a waiter can never miss the wakeup that
//! tells it to stop.
//!
//! ```text
//! bus-event thread                 EventInbox                  worker thread
//! ────────────────                 ──────────                  ─────────────
//!   record_detached ──────────►  removed: [a, b]  ◄────── take_matching_removal
//!   record_attached ──────────►  added:   [c]     ◄────── take_matching_attachment
//!          └── notify_all ─────►  Condvar  ────────────► await_event (bounded)
//! ```

use crate::cancel::CancellationToken;
use crate::identity::DeviceMatcher;
use protocol::DeviceInfo;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Default)]
struct Queues {
    removed: VecDeque<DeviceInfo>,
    added: VecDeque<DeviceInfo>,
}

/// Lock-protected pair of device event queues with a wait/notify signal
#[derive(Debug, Default)]
pub struct EventInbox {
    queues: Mutex<Queues>,
    signal: Condvar,
}

impl EventInbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        // The queues hold plain data, a panic elsewhere cannot leave them inconsistent
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a device that left the bus and wake all waiters
    pub fn record_detached(&self, device: DeviceInfo) {
        trace!("Inbox: detached {}", device);
        let mut queues = self.lock();
        queues.removed.push_back(device);
        self.signal.notify_all();
    }

    /// Record a device that appeared on the bus and wake all waiters
    pub fn record_attached(&self, device: DeviceInfo) {
        trace!("Inbox: attached {}", device);
        let mut queues = self.lock();
        queues.added.push_back(device);
        self.signal.notify_all();
    }

    /// Check the removed queue for `original`, then clear it
    ///
    /// The whole queue is dropped whether or not a match was found: only one
    /// transition is in flight, so anything else in there is noise.
    pub fn take_matching_removal(&self, original: &DeviceInfo, matcher: &dyn DeviceMatcher) -> bool {
        let mut queues = self.lock();
        let matched = queues
            .removed
            .iter()
            .any(|removed| matcher.is_likely_same_removal(original, removed));
        queues.removed.clear();
        matched
    }

    /// Check the attached queue for the device `original` turned into, then clear it
    ///
    /// Returns the freshly attached handle, never `original` itself.
    pub fn take_matching_attachment(
        &self,
        original: &DeviceInfo,
        matcher: &dyn DeviceMatcher,
    ) -> Option<DeviceInfo> {
        let mut queues = self.lock();
        let position = queues
            .added
            .iter()
            .position(|added| matcher.is_likely_same_physical_device(original, added));
        let matched = position.and_then(|i| queues.added.swap_remove_back(i));
        queues.added.clear();
        matched
    }

    /// Block until an event is recorded, the token is cancelled, or `timeout` passes
    ///
    /// Returns whether the wait was signaled. A timeout is not a failure, only
    /// a cue to check the queues again. Returns at once if already cancelled.
    pub fn await_event(&self, timeout: Duration, cancel: &CancellationToken) -> bool {
        let queues = self.lock();
        if cancel.is_cancelled() {
            return true;
        }
        let (_queues, result) = self
            .signal
            .wait_timeout(queues, timeout)
            .unwrap_or_else(|e| e.into_inner());
        !result.timed_out()
    }

    /// Drop all pending events
    ///
    /// Called before every new transition attempt so stale events from an
    /// unrelated device cannot produce a false match.
    pub fn reset_queues(&self) {
        let mut queues = self.lock();
        queues.removed.clear();
        queues.added.clear();
    }

    /// Cancel `cancel` and wake every waiter
    pub fn cancel_waiters(&self, cancel: &CancellationToken) {
        let _queues = self.lock();
        cancel.cancel();
        self.signal.notify_all();
    }

    /// Number of pending (removed, added) events
    pub fn pending(&self) -> (usize, usize) {
        let queues = self.lock();
        (queues.removed.len(), queues.added.len())
    }
}

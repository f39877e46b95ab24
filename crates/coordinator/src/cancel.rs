//! One-shot cancellation token
//!
//! Set once when the controller is released and never cleared. Waiters on the
//! event inbox observe it after every wakeup.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token. Returns true if this call is the one that set it.
    ///
    /// Prefer [`EventInbox::cancel_waiters`](crate::inbox::EventInbox::cancel_waiters),
    /// which also wakes blocked waiters.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

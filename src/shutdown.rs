//! Cooperative cancellation token for dispatcher runs.
//!
//! Requesting cancellation does not abort in-flight workers, it only
//! stops the dispatcher from launching new ones. The dispatcher keeps
//! waiting on already-launched work and returns once it all settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A cloneable handle that signals "stop launching new work" to a
/// running dispatcher without tearing down work already in flight.
#[derive(Clone)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("requested", &self.is_cancelled())
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Idempotent: requesting cancellation twice has the same effect as
    /// requesting it once.
    pub fn cancel(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("cancellation requested");
            self.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancellationToken::cancel`] has been called.
    /// Resolves immediately if cancellation was already requested.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

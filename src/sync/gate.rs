//! # SyncGate: the fleet-wide readiness barrier.
//!
//! A [`SyncGate`] is a one-shot gate released by the fleet operator once the
//! fleet is considered initially synced. Background jobs that depend on
//! fleet-wide readiness block on [`SyncGate::wait`] before their first
//! iteration; jobs already past the gate are unaffected.
//!
//! The gate is write-once and read-many: it is released at most meaningfully
//! once and never re-engages. It is an explicit value owned by the fleet and
//! cloned into each scheduler at construction — never ambient state.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot fleet readiness gate.
///
/// Cloning is cheap; all clones observe the same release.
#[derive(Clone)]
pub struct SyncGate {
    tx: Arc<watch::Sender<bool>>,
}

impl SyncGate {
    /// Creates a gate in the unreleased state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Releases the gate, waking all current and future waiters.
    ///
    /// Releasing an already-released gate is a no-op.
    pub fn release(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the gate has been released.
    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the gate is released; immediately if it already is.
    ///
    /// Callers inside a work group must race this against the stop signal so
    /// shutdown is not held up by an unreleased gate.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender is owned by self, so the channel cannot close under us.
        let _ = rx.wait_for(|released| *released).await;
    }
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

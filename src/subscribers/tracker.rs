//! # Stateful subscriber tracking running jobs per node.
//!
//! [`JobTracker`] maintains an in-memory set of `(data dir, job name)` pairs
//! by listening to [`EventKind::JobStarting`] and [`EventKind::JobStopped`].
//! The fleet status surface reads it to report which jobs each node is
//! currently running.
//!
//! ```text
//! jobs ── publish(Event) ──► Bus ──► listener ──► JobTracker
//!                                       │
//!               JobStarting: insert (dir, job)
//!               JobStopped:  remove (dir, job)
//!
//! Fleet::status() ──► JobTracker::jobs_for(dir) ──► Vec<String>
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Tracks which jobs are currently running on which node.
///
/// Thread-safe and cloneable; clones share the same state.
#[derive(Clone, Default)]
pub struct JobTracker {
    inner: Arc<Mutex<BTreeSet<(String, String)>>>,
}

impl JobTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of jobs currently running on the node with the
    /// given data directory, in sorted order.
    pub async fn jobs_for(&self, dir: &str) -> Vec<String> {
        let set = self.inner.lock().await;
        set.iter()
            .filter(|(d, _)| d == dir)
            .map(|(_, job)| job.clone())
            .collect()
    }

    /// Total number of running jobs across the fleet.
    pub async fn running(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl Subscribe for JobTracker {
    async fn on_event(&self, event: &Event) {
        let (Some(dir), Some(job)) = (&event.dir, &event.caller) else {
            return;
        };
        let key = (dir.to_string(), job.to_string());
        match event.kind {
            EventKind::JobStarting => {
                self.inner.lock().await.insert(key);
            }
            EventKind::JobStopped => {
                self.inner.lock().await.remove(&key);
            }
            _ => {}
        }
    }
}

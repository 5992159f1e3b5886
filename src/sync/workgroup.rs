//! # WorkGroup: bounded, cancellable, drainable concurrency.
//!
//! Every background job in the crate runs as a unit of work admitted through
//! a [`WorkGroup`]. The group hands out [`WorkGuard`]s on entry; dropping the
//! guard is the exit, so a unit exits exactly once no matter how it finishes
//! (return, early break, panic unwind).
//!
//! ## Architecture
//! ```text
//! try_enter() ──► admitted? ──► WorkGuard (active += 1)
//!                    │
//!                    └─ stopping ──► Err(Stopped)
//!
//! stop():
//!   1. mark stopping            (no further admissions)
//!   2. cancel stop token        (broadcast to all admitted units)
//!   3. wait active == 0         (drain)
//! ```
//!
//! ## Rules
//! - Admission and the stopping flag flip under one lock: a `try_enter`
//!   racing `stop()` either gets a guard that `stop()` will wait for, or
//!   fails with [`Stopped`]. There is no third outcome.
//! - `stop()` is idempotent; a second call returns once the group is drained.
//! - After `stop()` returns, every future `try_enter()` fails.
//! - Admitted units must poll [`WorkGroup::cancelled`] inside any wait or
//!   sleep, so shutdown is never blocked by a sleeping unit.
//!
//! ## Example
//! ```rust
//! use nodefarm::sync::WorkGroup;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let group = WorkGroup::new();
//! let guard = group.try_enter().unwrap();
//!
//! let worker = {
//!     let group = group.clone();
//!     tokio::spawn(async move {
//!         let _guard = guard;
//!         loop {
//!             tokio::select! {
//!                 _ = group.cancelled() => break,
//!                 _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
//!             }
//!         }
//!     })
//! };
//!
//! group.stop().await; // returns only after the worker dropped its guard
//! assert!(group.try_enter().is_err());
//! # worker.await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::Stopped;

/// Tracks admissions and the stopping flag. Mutated only through
/// `watch::Sender::send_modify`, which serializes transitions and wakes the
/// drain waiter in `stop()`.
#[derive(Clone, Copy, Debug, Default)]
struct GroupState {
    stopping: bool,
    active: usize,
}

struct Shared {
    stop: CancellationToken,
    state: watch::Sender<GroupState>,
}

/// Admits cancellable units of work and drains them deterministically.
///
/// Cloning is cheap; clones share the same admission state and stop signal.
#[derive(Clone)]
pub struct WorkGroup {
    shared: Arc<Shared>,
}

impl WorkGroup {
    /// Creates a new group accepting work.
    pub fn new() -> Self {
        let (state, _) = watch::channel(GroupState::default());
        Self {
            shared: Arc::new(Shared {
                stop: CancellationToken::new(),
                state,
            }),
        }
    }

    /// Admits one unit of work.
    ///
    /// Fails with [`Stopped`] once [`stop`](Self::stop) has begun. On success
    /// the returned [`WorkGuard`] must live for the duration of the unit;
    /// dropping it is the exit.
    pub fn try_enter(&self) -> Result<WorkGuard, Stopped> {
        let mut admitted = false;
        self.shared.state.send_modify(|s| {
            if !s.stopping {
                s.active += 1;
                admitted = true;
            }
        });
        if admitted {
            Ok(WorkGuard {
                shared: Arc::clone(&self.shared),
            })
        } else {
            Err(Stopped)
        }
    }

    /// Signals all admitted work to stop and blocks until every unit exited.
    ///
    /// Idempotent: concurrent or repeated calls all return once the group is
    /// drained. After the first call begins, no new work is admitted.
    pub async fn stop(&self) {
        self.shared.state.send_modify(|s| s.stopping = true);
        self.shared.stop.cancel();

        let mut rx = self.shared.state.subscribe();
        // wait_for inspects the current value before parking, so an exit
        // that lands between the cancel above and this call is not missed.
        // The sender lives in `self.shared`, so the channel cannot close.
        let _ = rx.wait_for(|s| s.active == 0).await;
    }

    /// Resolves when [`stop`](Self::stop) has been called.
    ///
    /// Every wait or sleep inside an admitted unit must race against this.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.shared.stop.cancelled()
    }

    /// A clone of the stop token, for embedding in contexts handed to jobs.
    pub fn stop_token(&self) -> CancellationToken {
        self.shared.stop.clone()
    }

    /// Whether `stop()` has begun. New admissions fail once this is true.
    pub fn is_stopped(&self) -> bool {
        self.shared.state.borrow().stopping
    }

    /// Number of currently admitted units.
    pub fn active(&self) -> usize {
        self.shared.state.borrow().active
    }
}

impl Default for WorkGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit token for one admitted unit of work.
///
/// Dropping the guard records the exit. Guards are not cloneable, so a unit
/// cannot exit twice.
pub struct WorkGuard {
    shared: Arc<Shared>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.shared
            .state
            .send_modify(|s| s.active = s.active.saturating_sub(1));
    }
}

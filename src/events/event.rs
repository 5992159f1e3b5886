//! # Runtime events emitted by nodes, jobs, and the fleet.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata a
//! subscriber needs to act on it: a [`Severity`], the caller tag (which job
//! or component emitted it), the node's data-directory path, and optional
//! detail fields.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use nodefarm::events::{Event, EventKind, Severity};
//!
//! let ev = Event::new(EventKind::JobRetry)
//!     .with_caller("balance")
//!     .with_dir("/tmp/fleet/node0")
//!     .with_reason("can't get wallet info: connection refused");
//!
//! assert_eq!(ev.kind, EventKind::JobRetry);
//! assert_eq!(ev.severity(), Severity::Error);
//! assert_eq!(ev.caller.as_deref(), Some("balance"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Node lifecycle ===
    /// A node process became reachable and its scheduler is up.
    ///
    /// Sets: `dir`.
    NodeStarted,

    /// A node's jobs drained and its process terminated.
    ///
    /// Sets: `dir`.
    NodeStopped,

    /// A node was restarted under a new binary at the same data directory.
    ///
    /// Sets: `dir`, `reason` (the new binary path).
    NodeUpgraded,

    // === Job lifecycle ===
    /// A job was admitted and is about to run.
    ///
    /// Sets: `caller` (job name), `dir`.
    JobStarting,

    /// A job exited (stop signal observed or work complete).
    ///
    /// Sets: `caller`, `dir`.
    JobStopped,

    /// A job's API call failed; the job backs off and retries.
    ///
    /// Sets: `caller`, `dir`, `reason` (the failure), `delay_ms`.
    JobRetry,

    // === State transitions ===
    /// The balance maintainer started the node's miner.
    ///
    /// Sets: `caller`, `dir`, `reason` (the observed balance).
    MinerStarted,

    /// The balance maintainer stopped the node's miner.
    ///
    /// Sets: `caller`, `dir`, `reason` (the observed balance).
    MinerStopped,

    // === Monitoring ===
    /// The gateway monitor observed fewer than the healthy minimum of peers.
    ///
    /// Sets: `caller`, `dir`, `peers`.
    LowPeerCount,

    /// Wiring one node's gateway to the hub failed; the sweep continues.
    ///
    /// Sets: `dir` (of the node that failed to connect), `reason`.
    PeerConnectFailed,

    // === Fleet ===
    /// The fleet converged to a single consensus group; the gate released.
    ///
    /// Sets: `reason` (nodes in the group).
    FleetSynced,
}

/// Log severity carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Error,
}

impl Severity {
    /// Stable uppercase label for log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Tag of the emitting job or component (e.g. `"balance"`, `"gateway"`).
    pub caller: Option<Arc<str>>,
    /// Data-directory path of the node the event concerns.
    pub dir: Option<Arc<str>>,
    /// Human-readable detail (error text, balance, binary path).
    pub reason: Option<Arc<str>>,
    /// Back-off delay before the next attempt, in milliseconds.
    pub delay_ms: Option<u32>,
    /// Observed peer count (monitoring events).
    pub peers: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            caller: None,
            dir: None,
            reason: None,
            delay_ms: None,
            peers: None,
        }
    }

    /// Severity implied by the event kind.
    ///
    /// Retried errors and connectivity regressions are errors; lifecycle and
    /// transitions are informational.
    pub fn severity(&self) -> Severity {
        match self.kind {
            EventKind::JobRetry | EventKind::LowPeerCount | EventKind::PeerConnectFailed => {
                Severity::Error
            }
            EventKind::JobStarting | EventKind::JobStopped => Severity::Debug,
            _ => Severity::Info,
        }
    }

    /// Attaches the caller tag.
    #[inline]
    pub fn with_caller(mut self, caller: impl Into<Arc<str>>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    /// Attaches the node's data-directory path.
    #[inline]
    pub fn with_dir(mut self, dir: impl Into<Arc<str>>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a back-off delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an observed peer count.
    #[inline]
    pub fn with_peers(mut self, n: usize) -> Self {
        self.peers = Some(n);
        self
    }
}

//! # Logging subscriber.
//!
//! [`LogWriter`] renders every event as a `tracing` record at the event's
//! severity, with the caller tag and the node's data-directory path as
//! fields. With a `tracing_subscriber` installed, a three-node fleet log
//! looks like:
//!
//! ```text
//! INFO  node started dir=/tmp/fleet/node0
//! ERROR job retry caller=balance dir=/tmp/fleet/node1 reason="can't get wallet info: connection refused" delay_ms=5000
//! ERROR low peer count caller=gateway dir=/tmp/fleet/node2 peers=1
//! ```
//!
//! File rotation and collection live outside this crate; this subscriber
//! only decides what each record says.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::events::{Event, EventKind, Severity};
use crate::subscribers::Subscribe;

/// Emits every bus event through `tracing`.
pub struct LogWriter;

impl LogWriter {
    fn describe(kind: EventKind) -> &'static str {
        match kind {
            EventKind::NodeStarted => "node started",
            EventKind::NodeStopped => "node stopped",
            EventKind::NodeUpgraded => "node upgraded",
            EventKind::JobStarting => "job starting",
            EventKind::JobStopped => "job stopped",
            EventKind::JobRetry => "job retry",
            EventKind::MinerStarted => "miner started",
            EventKind::MinerStopped => "miner stopped",
            EventKind::LowPeerCount => "low peer count",
            EventKind::PeerConnectFailed => "peer connect failed",
            EventKind::FleetSynced => "fleet synced",
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let msg = Self::describe(e.kind);
        let caller = e.caller.as_deref().unwrap_or("");
        let dir = e.dir.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.severity() {
            Severity::Error => {
                error!(
                    caller,
                    dir,
                    reason,
                    delay_ms = e.delay_ms,
                    peers = e.peers,
                    "{msg}"
                );
            }
            Severity::Info => {
                info!(caller, dir, reason, "{msg}");
            }
            Severity::Debug => {
                debug!(caller, dir, reason, "{msg}");
            }
        }
    }
}

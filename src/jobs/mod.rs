//! # Background jobs and their per-node scheduler.
//!
//! A job is a named, long-running behavior executed against one node. The
//! fixed registry knows three names:
//!
//! | Name        | Behavior                                                   |
//! |-------------|------------------------------------------------------------|
//! | `"balance"` | mine while the confirmed balance is at or below the target |
//! | `"gateway"` | watch the peer count and report connectivity regressions   |
//! | `"miner"`   | mine continuously                                          |
//!
//! Every job follows the same contract: it is admitted through the node's
//! [`WorkGroup`](crate::sync::WorkGroup), optionally blocks on the fleet
//! [`SyncGate`](crate::sync::SyncGate) before its first iteration, then loops
//! until the stop signal wins a `select!`. Transient API failures are
//! published as [`EventKind::JobRetry`](crate::events::EventKind) and retried
//! after a fixed back-off; they never terminate the job.

mod balance;
mod gateway;
mod miner;
mod scheduler;

pub use balance::BalanceMaintainer;
pub use gateway::GatewayMonitor;
pub use miner::Miner;
pub use scheduler::JobScheduler;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::NodeApi;
use crate::config::NodeConfig;
use crate::events::{Bus, Event, EventKind};
use crate::sync::SyncGate;

/// Job names accepted by [`JobScheduler::start_job`].
pub mod names {
    /// The balance maintainer (miner on/off state machine).
    pub const BALANCE: &str = "balance";
    /// The gateway connectivity monitor.
    pub const GATEWAY: &str = "gateway";
    /// The continuous miner.
    pub const MINER: &str = "miner";
}

/// Everything a running job needs: the node's API client, the fleet gate,
/// the stop signal, the event bus, and the node's data-directory tag.
#[derive(Clone)]
pub struct JobCtx {
    /// API client of the owning node.
    pub client: Arc<dyn NodeApi>,
    /// Fleet readiness gate.
    pub gate: SyncGate,
    /// Stop signal of the owning scheduler's work group.
    pub stop: CancellationToken,
    /// Event bus for lifecycle and retry reporting.
    pub bus: Bus,
    /// Data-directory path of the owning node, for log correlation.
    pub dir: Arc<str>,
}

impl JobCtx {
    /// Blocks until the fleet gate releases.
    ///
    /// Returns `false` if the stop signal won instead; the job must return
    /// without doing work.
    pub async fn wait_synced(&self) -> bool {
        tokio::select! {
            _ = self.gate.wait() => true,
            _ = self.stop.cancelled() => false,
        }
    }

    /// Sleeps for `d`, racing the stop signal.
    ///
    /// Returns `false` if stop won; the pending delay is abandoned.
    pub async fn sleep(&self, d: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(d) => true,
            _ = self.stop.cancelled() => false,
        }
    }

    /// Completes when the stop signal fires.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }

    /// Publishes a [`EventKind::JobRetry`] for a transient failure about to
    /// be retried after `delay`.
    pub fn report_retry(&self, caller: &str, reason: String, delay: Duration) {
        self.bus.publish(
            Event::new(EventKind::JobRetry)
                .with_caller(caller)
                .with_dir(Arc::clone(&self.dir))
                .with_reason(reason)
                .with_delay(delay),
        );
    }
}

/// # A named, long-running background behavior against one node.
///
/// `run` owns the whole job lifetime; it returns only when the work is done
/// or the stop signal fired. Steady-state failures are reported on the bus,
/// never returned.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// The registry name of this job.
    fn name(&self) -> &'static str;

    /// Executes the job until completion or stop.
    async fn run(&self, ctx: JobCtx);
}

/// Builds the job registered under `name`, configured from the node's
/// tunables. `None` for unrecognized names.
pub(crate) fn build(name: &str, config: &NodeConfig) -> Option<Box<dyn Job>> {
    match name {
        names::BALANCE => Some(Box::new(BalanceMaintainer::new(config.desired_balance))),
        names::GATEWAY => Some(Box::new(GatewayMonitor)),
        names::MINER => Some(Box::new(Miner)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::PathBuf;

    use crate::config::NodeConfig;

    /// A minimal attached-node config for driving schedulers and jobs
    /// against a stub client.
    pub(crate) fn test_config(dir: &str) -> NodeConfig {
        NodeConfig {
            api_addr: "127.0.0.1:9980".into(),
            peer_addr: "127.0.0.1:9981".into(),
            rpc_addr: "127.0.0.1:9982".into(),
            data_dir: PathBuf::from(dir),
            binary: None,
            api_password: None,
            jobs: Vec::new(),
            desired_balance: 5_000,
            disable_ip_violation_check: false,
            allow_local_peers: true,
        }
    }
}

//! # JobScheduler: per-node registry and lifecycle of background jobs.
//!
//! One scheduler per node handle. Construction performs the wallet bootstrap
//! (the node is useless to jobs without an unlocked wallet), after which
//! [`JobScheduler::start_job`] admits jobs by name under the node's work
//! group and [`JobScheduler::stop`] drains them deterministically.
//!
//! ## Wallet bootstrap
//! ```text
//! existing seed?   wallet encrypted?   action
//! ─────────────    ────────────────    ──────────────────────────────
//! no               (any)               init fresh wallet, capture seed
//! yes              no                  init wallet from that seed
//! yes              yes                 keep the seed (post-upgrade path)
//!
//! then: unlock with the resolved seed — always
//! ```
//! The resolved seed is held by the scheduler for its entire life and is
//! threaded into the replacement scheduler on upgrade, so a node keeps
//! exactly one seed no matter how many binaries it runs.
//!
//! ## Shutdown
//! `stop()` observes the work-group contract: on return, zero tasks remain
//! associated with this node. Only then is it safe to kill the process or
//! reuse the data directory.

use std::sync::Arc;

use crate::client::NodeApi;
use crate::config::NodeConfig;
use crate::error::{JobError, NodeError};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{self, JobCtx};
use crate::sync::{SyncGate, WorkGroup};

/// Registry and runner of one node's background jobs.
pub struct JobScheduler {
    group: WorkGroup,
    client: Arc<dyn NodeApi>,
    gate: SyncGate,
    bus: Bus,
    config: NodeConfig,
    seed: String,
    dir: Arc<str>,
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("config", &self.config)
            .field("seed", &self.seed)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl JobScheduler {
    /// Creates a scheduler for the node behind `client`, performing the
    /// wallet bootstrap described in the module docs.
    ///
    /// `existing_seed` is `None` on first start and the previous scheduler's
    /// seed on upgrade. Any bootstrap failure is fatal: no scheduler (and so
    /// no node handle) is returned.
    pub async fn new(
        client: Arc<dyn NodeApi>,
        gate: SyncGate,
        bus: Bus,
        config: NodeConfig,
        existing_seed: Option<String>,
    ) -> Result<Self, NodeError> {
        let data_dir = config.data_dir.clone();
        let wallet_err = |source| NodeError::WalletSetup {
            data_dir: data_dir.clone(),
            source,
        };

        let info = client.wallet().await.map_err(wallet_err)?;
        let seed = match existing_seed {
            None => {
                let init = client.wallet_init().await.map_err(wallet_err)?;
                tracing::debug!(dir = %config.data_dir.display(), "initialized fresh wallet");
                init.primary_seed
            }
            Some(seed) if !info.encrypted => {
                client.wallet_init_seed(&seed).await.map_err(wallet_err)?;
                tracing::debug!(dir = %config.data_dir.display(), "initialized wallet from existing seed");
                seed
            }
            Some(seed) => {
                // Encrypted wallet on disk already carries this seed;
                // hit during upgrades with scheduler re-creation.
                seed
            }
        };
        client.wallet_unlock(&seed).await.map_err(wallet_err)?;

        let dir: Arc<str> = Arc::from(config.dir_tag().as_str());
        Ok(Self {
            group: WorkGroup::new(),
            client,
            gate,
            bus,
            config,
            seed,
            dir,
        })
    }

    /// The wallet seed resolved at construction. Stable for the scheduler's
    /// lifetime; thread it into the replacement scheduler on upgrade.
    pub fn wallet_seed(&self) -> &str {
        &self.seed
    }

    /// Starts the job registered under `name`.
    ///
    /// Fails synchronously with [`JobError::Unknown`] for names outside the
    /// registry (no side effects) and [`JobError::Stopped`] once `stop()`
    /// has begun (the job never runs). Jobs start in invocation order;
    /// execution interleaving across jobs is unordered.
    pub fn start_job(&self, name: &str) -> Result<(), JobError> {
        let job = jobs::build(name, &self.config).ok_or_else(|| JobError::Unknown {
            name: name.to_string(),
        })?;
        let guard = self.group.try_enter()?;

        let ctx = JobCtx {
            client: Arc::clone(&self.client),
            gate: self.gate.clone(),
            stop: self.group.stop_token(),
            bus: self.bus.clone(),
            dir: Arc::clone(&self.dir),
        };
        let bus = self.bus.clone();
        let dir = Arc::clone(&self.dir);
        tokio::spawn(async move {
            // The guard is the unit's exit token; dropping it on any path
            // out of this task records the exit.
            let _guard = guard;
            bus.publish(
                Event::new(EventKind::JobStarting)
                    .with_caller(job.name())
                    .with_dir(Arc::clone(&dir)),
            );
            job.run(ctx).await;
            bus.publish(
                Event::new(EventKind::JobStopped)
                    .with_caller(job.name())
                    .with_dir(dir),
            );
        });
        Ok(())
    }

    /// Signals all jobs to stop and blocks until they have drained.
    ///
    /// Idempotent. On return no tasks associated with this node remain.
    pub async fn stop(&self) {
        self.group.stop().await;
    }

    /// Number of currently admitted jobs. Diagnostic.
    pub fn active_jobs(&self) -> usize {
        self.group.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stub::StubNode;
    use crate::jobs::testutil::test_config;

    async fn scheduler_with(
        stub: Arc<StubNode>,
        existing_seed: Option<String>,
    ) -> Result<JobScheduler, NodeError> {
        JobScheduler::new(
            stub,
            SyncGate::new(),
            Bus::default(),
            test_config("/tmp/sched-test"),
            existing_seed,
        )
        .await
    }

    #[tokio::test]
    async fn test_fresh_wallet_is_initialized_and_unlocked() {
        let stub = Arc::new(StubNode::new());
        let sched = scheduler_with(Arc::clone(&stub), None).await.unwrap();

        assert_eq!(sched.wallet_seed(), "stub-seed-1");
        stub.snapshot(|s| {
            assert_eq!(s.init_calls, 1);
            assert_eq!(s.init_seed_calls, 0);
            assert!(s.unlocked);
        });
    }

    #[tokio::test]
    async fn test_supplied_seed_initializes_unencrypted_wallet() {
        let stub = Arc::new(StubNode::new());
        let sched = scheduler_with(Arc::clone(&stub), Some("carried-seed".into()))
            .await
            .unwrap();

        assert_eq!(sched.wallet_seed(), "carried-seed");
        stub.snapshot(|s| {
            assert_eq!(s.init_calls, 0);
            assert_eq!(s.init_seed_calls, 1);
            assert!(s.unlocked);
        });
    }

    #[tokio::test]
    async fn test_encrypted_wallet_skips_initialization() {
        let stub = Arc::new(StubNode::new());
        stub.mutate(|s| {
            s.encrypted = true;
            s.seed = Some("carried-seed".into());
        });
        let sched = scheduler_with(Arc::clone(&stub), Some("carried-seed".into()))
            .await
            .unwrap();

        assert_eq!(sched.wallet_seed(), "carried-seed");
        stub.snapshot(|s| {
            assert_eq!(s.init_calls, 0);
            assert_eq!(s.init_seed_calls, 0);
            assert!(s.unlocked);
        });
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_fatal() {
        let stub = Arc::new(StubNode::new());
        stub.mutate(|s| s.fail_next_wallet = true);
        let err = scheduler_with(stub, None).await.unwrap_err();
        assert_eq!(err.as_label(), "node_wallet_setup");
    }

    #[tokio::test]
    async fn test_seed_survives_scheduler_recreation() {
        // The upgrade path: a second scheduler is built against the same
        // (now encrypted) wallet with the first scheduler's seed.
        let stub = Arc::new(StubNode::new());
        let first = scheduler_with(Arc::clone(&stub), None).await.unwrap();
        let seed = first.wallet_seed().to_string();
        first.stop().await;

        let second = scheduler_with(Arc::clone(&stub), Some(seed.clone()))
            .await
            .unwrap();
        assert_eq!(second.wallet_seed(), seed);
        // The wallet database was not re-initialized by the swap.
        stub.snapshot(|s| {
            assert_eq!(s.init_calls, 1);
            assert_eq!(s.init_seed_calls, 0);
        });
    }

    #[tokio::test]
    async fn test_unknown_job_fails_without_side_effects() {
        let stub = Arc::new(StubNode::new());
        let sched = scheduler_with(stub, None).await.unwrap();

        let err = sched.start_job("thisjobdoesnotexist").unwrap_err();
        assert!(matches!(err, JobError::Unknown { ref name } if name == "thisjobdoesnotexist"));
        assert_eq!(sched.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_start_job_after_stop_fails_and_never_runs() {
        let stub = Arc::new(StubNode::new());
        let sched = scheduler_with(Arc::clone(&stub), None).await.unwrap();
        sched.stop().await;

        let err = sched.start_job(crate::jobs::names::MINER).unwrap_err();
        assert!(matches!(err, JobError::Stopped(_)));
        tokio::task::yield_now().await;
        stub.snapshot(|s| assert_eq!(s.miner_starts, 0));
    }

    #[tokio::test]
    async fn test_stop_drains_running_jobs() {
        let stub = Arc::new(StubNode::new());
        let sched = scheduler_with(stub, None).await.unwrap();

        sched.start_job(crate::jobs::names::GATEWAY).unwrap();
        sched.start_job(crate::jobs::names::BALANCE).unwrap();
        assert_eq!(sched.active_jobs(), 2);

        sched.stop().await;
        assert_eq!(sched.active_jobs(), 0);
    }
}

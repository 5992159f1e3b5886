//! # NodeHandle: one managed node.
//!
//! A handle has a stable external identity — its [`NodeConfig`], most
//! importantly the data directory — and an internal, swappable live state:
//! the running process (absent for attached endpoints), the API client bound
//! to it, and the node's [`JobScheduler`]. The live triple is replaced as a
//! unit during upgrades, under a lock held only for the swap; steady-state
//! operations clone the client out of the lock and work unlocked.
//!
//! ## Lifecycle
//! ```text
//! start(config)        spawn process ─► wait reachable ─► wallet bootstrap
//!   or connect(...)    (validate endpoint)                + scheduler
//!                               │
//!                               ▼
//!                      start configured jobs ─► live
//!
//! stop()               drain scheduler ─► SIGTERM/SIGKILL ─► clear locks
//!
//! upgrade(binary)      stop ─► start under new binary, same data dir,
//!                      scheduler re-created with the same wallet seed;
//!                      on failure the handle is left stopped
//! ```
//!
//! ## Rules
//! - Construction failures never return a partial handle: an unreachable or
//!   bootstrap-failed node is terminated before the error propagates.
//! - `stop()` is idempotent and drains before the process dies, so no task
//!   is left talking to a corpse.
//! - One wallet seed per node for the node's entire lifetime; upgrades
//!   thread it through scheduler re-creation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::{HttpClient, NodeApi};
use crate::config::NodeConfig;
use crate::error::{JobError, NodeError, Stopped};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::JobScheduler;
use crate::node::process::{self, NodeProcess};
use crate::sync::SyncGate;

/// The swappable live state: replaced as a unit on upgrade, absent once the
/// handle is stopped.
struct Live {
    process: Option<NodeProcess>,
    client: Arc<dyn NodeApi>,
    scheduler: JobScheduler,
}

/// One managed node process (or attached endpoint) and its jobs.
pub struct NodeHandle {
    config: NodeConfig,
    bus: Bus,
    gate: SyncGate,
    live: Mutex<Option<Live>>,
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NodeHandle {
    /// Launches the node described by `config` and waits for it to become
    /// reachable, then bootstraps the wallet and starts the configured jobs.
    ///
    /// With `config.binary` unset, attaches to the endpoint already serving
    /// at `config.api_addr` instead of launching anything.
    pub async fn start(
        config: NodeConfig,
        bus: Bus,
        gate: SyncGate,
    ) -> Result<Arc<Self>, NodeError> {
        let client: Arc<dyn NodeApi> = Arc::new(HttpClient::new(
            &config.api_addr,
            config.api_password.clone(),
        ));
        Self::bring_up_new(config, client, bus, gate).await
    }

    /// Attaches to an already-running node through a caller-supplied client.
    ///
    /// The handle owns no process; `stop()` only drains the jobs and
    /// `upgrade()` is refused. Useful for externally managed nodes and for
    /// driving the orchestration layer over a custom transport.
    pub async fn connect(
        config: NodeConfig,
        client: Arc<dyn NodeApi>,
        bus: Bus,
        gate: SyncGate,
    ) -> Result<Arc<Self>, NodeError> {
        Self::bring_up_new(config, client, bus, gate).await
    }

    async fn bring_up_new(
        config: NodeConfig,
        client: Arc<dyn NodeApi>,
        bus: Bus,
        gate: SyncGate,
    ) -> Result<Arc<Self>, NodeError> {
        let handle = Arc::new(Self {
            config,
            bus,
            gate,
            live: Mutex::new(None),
        });
        let binary = handle.config.binary.clone();
        let live = handle.bring_up(client, binary.as_deref(), None).await?;
        *handle.live.lock().await = Some(live);
        handle.bus.publish(
            Event::new(EventKind::NodeStarted).with_dir(handle.config.dir_tag().as_str()),
        );
        Ok(handle)
    }

    /// Builds a live triple: process (when a binary is given), reachability
    /// wait, wallet bootstrap, configured jobs. Cleans up after itself on
    /// every failure path so the caller never sees a half-started node.
    async fn bring_up(
        &self,
        client: Arc<dyn NodeApi>,
        binary: Option<&Path>,
        existing_seed: Option<String>,
    ) -> Result<Live, NodeError> {
        let process = match binary {
            Some(binary) => {
                let mut proc = NodeProcess::spawn(&self.config, binary)?;
                if let Err(e) = proc.wait_reachable(client.as_ref(), &self.config).await {
                    let _ = proc.terminate(&self.config.data_dir).await;
                    return Err(e);
                }
                Some(proc)
            }
            None => {
                process::wait_endpoint(client.as_ref(), &self.config).await?;
                None
            }
        };

        let scheduler = match JobScheduler::new(
            Arc::clone(&client),
            self.gate.clone(),
            self.bus.clone(),
            self.config.clone(),
            existing_seed,
        )
        .await
        {
            Ok(scheduler) => scheduler,
            Err(e) => {
                if let Some(proc) = process {
                    let _ = proc.terminate(&self.config.data_dir).await;
                }
                return Err(e);
            }
        };

        for name in &self.config.jobs {
            if let Err(source) = scheduler.start_job(name) {
                scheduler.stop().await;
                if let Some(proc) = process {
                    let _ = proc.terminate(&self.config.data_dir).await;
                }
                return Err(NodeError::Job {
                    data_dir: self.config.data_dir.clone(),
                    source,
                });
            }
        }

        Ok(Live {
            process,
            client,
            scheduler,
        })
    }

    /// The node's immutable configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// A clone of the node's API client, or `None` once stopped.
    pub async fn client(&self) -> Option<Arc<dyn NodeApi>> {
        self.live
            .lock()
            .await
            .as_ref()
            .map(|live| Arc::clone(&live.client))
    }

    /// The wallet seed resolved at bootstrap, or `None` once stopped.
    pub async fn wallet_seed(&self) -> Option<String> {
        self.live
            .lock()
            .await
            .as_ref()
            .map(|live| live.scheduler.wallet_seed().to_string())
    }

    /// Whether the handle currently holds live state.
    pub async fn is_running(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Starts a job by name on the node's scheduler.
    pub async fn start_job(&self, name: &str) -> Result<(), JobError> {
        match &*self.live.lock().await {
            Some(live) => live.scheduler.start_job(name),
            None => Err(JobError::Stopped(Stopped)),
        }
    }

    /// Drains the node's jobs, terminates the process, and clears stale lock
    /// files. Idempotent: stopping a stopped handle succeeds.
    pub async fn stop(&self) -> Result<(), NodeError> {
        let Some(live) = self.live.lock().await.take() else {
            return Ok(());
        };
        live.scheduler.stop().await;
        if let Some(proc) = live.process {
            proc.terminate(&self.config.data_dir).await?;
        }
        process::clear_stale_locks(&self.config.data_dir)?;
        self.bus
            .publish(Event::new(EventKind::NodeStopped).with_dir(self.config.dir_tag().as_str()));
        Ok(())
    }

    /// Replaces the node's process with one running `new_binary`, keeping
    /// the data directory, addresses, and wallet identity.
    ///
    /// Fails atomically: if the new process does not become reachable (or
    /// the scheduler cannot be re-created), the handle is left stopped
    /// rather than silently running stale state. Attached handles are
    /// refused with [`NodeError::NotOwned`].
    pub async fn upgrade(&self, new_binary: impl Into<PathBuf>) -> Result<(), NodeError> {
        let new_binary = new_binary.into();
        // The swap lock: held across stop + restart so no caller observes a
        // half-swapped node. Steady-state operations do not contend here
        // beyond the brief client clone.
        let mut guard = self.live.lock().await;
        let live = guard.take().ok_or_else(|| NodeError::NotRunning {
            data_dir: self.config.data_dir.clone(),
        })?;
        if live.process.is_none() {
            let data_dir = self.config.data_dir.clone();
            *guard = Some(live);
            return Err(NodeError::NotOwned { data_dir });
        }

        let seed = live.scheduler.wallet_seed().to_string();
        let client = Arc::clone(&live.client);
        live.scheduler.stop().await;
        if let Some(proc) = live.process {
            proc.terminate(&self.config.data_dir).await?;
        }
        process::clear_stale_locks(&self.config.data_dir)?;

        // The wallet database stays on disk; the re-created scheduler sees
        // an encrypted wallet and keeps the threaded seed.
        let new_live = self
            .bring_up(client, Some(&new_binary), Some(seed))
            .await?;
        *guard = Some(new_live);
        self.bus.publish(
            Event::new(EventKind::NodeUpgraded)
                .with_dir(self.config.dir_tag().as_str())
                .with_reason(new_binary.display().to_string()),
        );
        Ok(())
    }
}

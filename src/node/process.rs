//! # External node process control.
//!
//! Spawning, health-waiting, and terminating the node binary. Graceful
//! termination sends SIGTERM and escalates to SIGKILL after a grace window;
//! stale lock files left behind by a killed process are cleared so a later
//! restart under the same data directory is not refused.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::client::NodeApi;
use crate::config::NodeConfig;
use crate::error::NodeError;

/// How long a freshly launched node gets to answer its status endpoint.
pub(crate) const START_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between reachability probes while waiting for startup.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Window between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(10);

/// Lock file the node leaves in its data directory while running.
const LOCK_FILE: &str = "node.lock";

/// A spawned node process.
#[derive(Debug)]
pub(crate) struct NodeProcess {
    child: Child,
}

impl NodeProcess {
    /// Launches the node binary with the addresses and data directory from
    /// `config`.
    pub(crate) fn spawn(config: &NodeConfig, binary: &Path) -> Result<Self, NodeError> {
        let mut cmd = Command::new(binary);
        cmd.arg("--api-addr")
            .arg(&config.api_addr)
            .arg("--peer-addr")
            .arg(&config.peer_addr)
            .arg("--rpc-addr")
            .arg(&config.rpc_addr)
            .arg("--dir")
            .arg(&config.data_dir);
        if config.disable_ip_violation_check {
            cmd.arg("--disable-ip-violation-check");
        }
        if config.allow_local_peers {
            cmd.arg("--allow-local-peers");
        }
        if let Some(pw) = &config.api_password {
            cmd.env("NODE_API_PASSWORD", pw);
        }
        // Node output goes to the node's own log files in its data dir;
        // inheriting it would interleave a whole fleet onto one terminal.
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| NodeError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;
        Ok(Self { child })
    }

    /// Polls the node's status endpoint until it answers, the process exits,
    /// or the startup window elapses.
    pub(crate) async fn wait_reachable(
        &mut self,
        client: &dyn NodeApi,
        config: &NodeConfig,
    ) -> Result<(), NodeError> {
        let deadline = Instant::now() + START_TIMEOUT;
        loop {
            if client.chain_tip().await.is_ok() {
                return Ok(());
            }
            if let Some(status) = self.child.try_wait().map_err(|source| NodeError::Io {
                data_dir: config.data_dir.clone(),
                source,
            })? {
                return Err(NodeError::ProcessExited {
                    data_dir: config.data_dir.clone(),
                    status: status.code(),
                });
            }
            if Instant::now() >= deadline {
                return Err(NodeError::StartTimeout {
                    data_dir: config.data_dir.clone(),
                    timeout: START_TIMEOUT,
                });
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    /// Terminates the process: SIGTERM, then SIGKILL after the grace window.
    pub(crate) async fn terminate(mut self, data_dir: &Path) -> Result<(), NodeError> {
        let io_err = |source| NodeError::Io {
            data_dir: data_dir.to_path_buf(),
            source,
        };

        if let Some(pid) = self.child.id() {
            // Errors here mean the process is already gone; wait() below
            // reaps it either way.
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            match tokio::time::timeout(KILL_GRACE, self.child.wait()).await {
                Ok(res) => {
                    res.map_err(io_err)?;
                }
                Err(_elapsed) => {
                    self.child.kill().await.map_err(io_err)?;
                }
            }
        }
        Ok(())
    }
}

/// Validates that an endpoint is serving before attaching to it.
///
/// Same reachability window as a spawned process, minus the exit check —
/// there is no child to watch.
pub(crate) async fn wait_endpoint(
    client: &dyn NodeApi,
    config: &NodeConfig,
) -> Result<(), NodeError> {
    let deadline = Instant::now() + START_TIMEOUT;
    loop {
        if client.chain_tip().await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(NodeError::StartTimeout {
                data_dir: config.data_dir.clone(),
                timeout: START_TIMEOUT,
            });
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Removes lock files a terminated process left in `data_dir`.
pub(crate) fn clear_stale_locks(data_dir: &Path) -> Result<(), NodeError> {
    let lock = data_dir.join(LOCK_FILE);
    match std::fs::remove_file(&lock) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(NodeError::Io {
            data_dir: data_dir.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stub::StubNode;
    use crate::jobs::testutil::test_config;

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let config = test_config("/tmp/process-test");
        let err = NodeProcess::spawn(&config, Path::new("/nonexistent/node-binary")).unwrap_err();
        assert_eq!(err.as_label(), "node_spawn");
    }

    #[tokio::test]
    async fn test_exited_process_is_detected() {
        // `false` exits immediately and the endpoint never answers, so the
        // poll loop must notice the exit rather than wait out the window.
        let config = test_config("/tmp/process-test");
        let offline = StubNode::new();
        offline.mutate(|s| s.offline = true);

        let mut proc = NodeProcess::spawn(&config, Path::new("/bin/false")).unwrap();
        let err = proc.wait_reachable(&offline, &config).await.unwrap_err();
        assert_eq!(err.as_label(), "node_process_exited");
    }

    #[tokio::test]
    async fn test_reachable_endpoint_passes_validation() {
        let config = test_config("/tmp/process-test");
        let stub = StubNode::new();
        wait_endpoint(&stub, &config).await.unwrap();
    }

    #[test]
    fn test_clear_stale_locks_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        // Missing lock file is fine.
        clear_stale_locks(dir.path()).unwrap();

        std::fs::write(dir.path().join(LOCK_FILE), b"pid 1234").unwrap();
        clear_stale_locks(dir.path()).unwrap();
        assert!(!dir.path().join(LOCK_FILE).exists());
        clear_stale_locks(dir.path()).unwrap();
    }
}

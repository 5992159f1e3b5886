//! Error types used by the nodefarm runtime and jobs.
//!
//! This module defines the domain-split error enums:
//!
//! - [`NodeError`] — failures while starting, stopping, or upgrading one node.
//! - [`FleetError`] — failures of fleet-wide operations (peer wiring, consensus queries).
//! - [`JobError`] — failures raised when scheduling background jobs.
//! - [`Stopped`] — the work group has begun stopping; no new work is admitted.
//!
//! Construction and query failures propagate to the caller with context.
//! Steady-state job failures never surface through these types — running jobs
//! report transient errors on the event bus and retry.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::client::ClientError;

/// The work group has begun stopping; new units of work are refused.
///
/// Returned by [`WorkGroup::try_enter`](crate::sync::WorkGroup::try_enter) and
/// surfaced through [`JobError::Stopped`] when a job is scheduled against a
/// draining node.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("work group is stopped")]
pub struct Stopped;

/// # Errors produced by node lifecycle operations.
///
/// These are fatal to the operation that raised them: a node that fails to
/// start is never returned as a partial handle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NodeError {
    /// The node process did not answer its status endpoint within the allowed window.
    #[error("node at {data_dir:?} not reachable within {timeout:?}")]
    StartTimeout {
        /// Data directory identifying the node.
        data_dir: PathBuf,
        /// The reachability window that elapsed.
        timeout: Duration,
    },

    /// The node process terminated before becoming reachable.
    #[error("node process at {data_dir:?} exited before becoming reachable{}", exit_detail(.status))]
    ProcessExited {
        /// Data directory identifying the node.
        data_dir: PathBuf,
        /// Exit status, if the process could be reaped.
        status: Option<i32>,
    },

    /// Wallet bootstrap failed; no job can run without an unlocked wallet.
    #[error("wallet setup for {data_dir:?} failed: {source}")]
    WalletSetup {
        /// Data directory identifying the node.
        data_dir: PathBuf,
        /// The underlying API failure.
        #[source]
        source: ClientError,
    },

    /// The operation requires an owned process, but this handle is attached
    /// to an externally managed endpoint.
    #[error("node at {data_dir:?} is not owned by this handle")]
    NotOwned {
        /// Data directory identifying the node.
        data_dir: PathBuf,
    },

    /// The handle is stopped; there is nothing to operate on.
    #[error("node at {data_dir:?} is stopped")]
    NotRunning {
        /// Data directory identifying the node.
        data_dir: PathBuf,
    },

    /// A job configured for this node could not be started.
    #[error("can't start configured job for {data_dir:?}: {source}")]
    Job {
        /// Data directory identifying the node.
        data_dir: PathBuf,
        /// The scheduler's rejection.
        #[source]
        source: JobError,
    },

    /// Filesystem failure while managing the node's data directory.
    #[error("io error for {data_dir:?}: {source}")]
    Io {
        /// Data directory identifying the node.
        data_dir: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to spawn the node binary.
    #[error("can't spawn {binary:?}: {source}")]
    Spawn {
        /// Path to the binary that failed to launch.
        binary: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl NodeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            NodeError::StartTimeout { .. } => "node_start_timeout",
            NodeError::ProcessExited { .. } => "node_process_exited",
            NodeError::WalletSetup { .. } => "node_wallet_setup",
            NodeError::NotOwned { .. } => "node_not_owned",
            NodeError::NotRunning { .. } => "node_not_running",
            NodeError::Job { .. } => "node_job",
            NodeError::Io { .. } => "node_io",
            NodeError::Spawn { .. } => "node_spawn",
        }
    }
}

fn exit_detail(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

/// # Errors produced by fleet-wide operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FleetError {
    /// Peer wiring needs at least two handles.
    #[error("connecting peers requires at least two nodes, got {got}")]
    InsufficientPeers {
        /// Number of handles supplied.
        got: usize,
    },

    /// A consensus query against one node failed, so the whole partition
    /// computation is invalid. A partial view would be worse than an error.
    #[error("consensus query against {data_dir:?} failed: {source}")]
    ConsensusQuery {
        /// Data directory of the node whose query failed.
        data_dir: PathBuf,
        /// The underlying API failure.
        #[source]
        source: ClientError,
    },

    /// The fleet did not converge to a single consensus group in time.
    #[error("fleet not synced within {timeout:?}; {groups} consensus groups remain")]
    SyncTimeout {
        /// The window that elapsed.
        timeout: Duration,
        /// Number of groups observed at the deadline.
        groups: usize,
    },

    /// A node failed during fleet construction or teardown.
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl FleetError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            FleetError::InsufficientPeers { .. } => "fleet_insufficient_peers",
            FleetError::ConsensusQuery { .. } => "fleet_consensus_query",
            FleetError::SyncTimeout { .. } => "fleet_sync_timeout",
            FleetError::Node(e) => e.as_label(),
        }
    }
}

/// # Errors produced when scheduling background jobs.
///
/// Raised synchronously by [`JobScheduler::start_job`](crate::jobs::JobScheduler::start_job);
/// a running job never surfaces errors through this type.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// The job name is not in the registry. A caller error, not a silent no-op.
    #[error("unknown job {name:?}")]
    Unknown {
        /// The unrecognized name as supplied.
        name: String,
    },

    /// The scheduler has begun stopping; the job was not started.
    #[error(transparent)]
    Stopped(#[from] Stopped),
}

impl JobError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Unknown { .. } => "job_unknown",
            JobError::Stopped(_) => "job_stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let err = JobError::Unknown {
            name: "spelunking".into(),
        };
        assert_eq!(err.as_label(), "job_unknown");
        assert_eq!(JobError::from(Stopped).as_label(), "job_stopped");
        assert_eq!(
            FleetError::InsufficientPeers { got: 1 }.as_label(),
            "fleet_insufficient_peers"
        );
    }

    #[test]
    fn test_process_exited_message_includes_status() {
        let err = NodeError::ProcessExited {
            data_dir: PathBuf::from("/tmp/node0"),
            status: Some(2),
        };
        assert!(err.to_string().contains("status 2"));

        let err = NodeError::ProcessExited {
            data_dir: PathBuf::from("/tmp/node0"),
            status: None,
        };
        assert!(!err.to_string().contains("status"));
    }
}

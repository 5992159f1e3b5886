//! # Fleet and node configuration.
//!
//! [`NodeConfig`] describes one managed node: its network addresses, data
//! directory, binary, and the background jobs to run against it. It is
//! immutable once supplied — a node keeps the exact configuration it was
//! constructed with for its entire lifetime, across restarts and upgrades.
//!
//! [`FleetConfig`] bundles the node configs with the fleet's own data
//! directory. Parsing these structs out of files or CLI flags happens outside
//! this crate; they only need to deserialize cleanly.

use std::io;
use std::net::TcpListener;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::client::Currency;

/// Configuration for a single managed node. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address of the node's HTTP API (`host:port`).
    pub api_addr: String,
    /// Address the node's gateway listens on for peer connections.
    pub peer_addr: String,
    /// Address of the node's host RPC listener.
    pub rpc_addr: String,
    /// Directory holding the node's chain and wallet databases.
    pub data_dir: PathBuf,
    /// Path to the node binary. `None` attaches to an already-running
    /// endpoint at `api_addr` instead of launching a process.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Password protecting the node's API, if any.
    #[serde(default)]
    pub api_password: Option<String>,
    /// Names of the background jobs to start once the node is up.
    #[serde(default)]
    pub jobs: Vec<String>,
    /// Balance the balance-maintainer job mines towards.
    #[serde(default = "default_desired_balance")]
    pub desired_balance: Currency,
    /// Disables the node's IP-violation check, needed when many nodes share
    /// one host address in a test fleet.
    #[serde(default)]
    pub disable_ip_violation_check: bool,
    /// Permits peer connections to loopback addresses.
    #[serde(default)]
    pub allow_local_peers: bool,
}

fn default_desired_balance() -> Currency {
    // Enough to fund a handful of test transactions without throttling the
    // miner immediately after the first block reward.
    5_000_000
}

impl NodeConfig {
    /// Returns the data directory as a display tag for log correlation.
    pub fn dir_tag(&self) -> String {
        self.data_dir.display().to_string()
    }
}

/// Configuration for a whole fleet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Directory for fleet-level state and logs.
    pub data_dir: PathBuf,
    /// One entry per managed node.
    pub nodes: Vec<NodeConfig>,
}

/// Reserves `n` distinct free localhost addresses.
///
/// Binds ephemeral listeners and returns their `127.0.0.1:port` addresses.
/// The listeners are dropped before returning, so the ports are free but not
/// reserved — fine for tests spinning up a fleet immediately afterwards.
pub fn free_local_addrs(n: usize) -> io::Result<Vec<String>> {
    let mut listeners = Vec::with_capacity(n);
    let mut addrs = Vec::with_capacity(n);
    for _ in 0..n {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        addrs.push(listener.local_addr()?.to_string());
        // Hold every listener until all addresses are picked so the same
        // port is not handed out twice.
        listeners.push(listener);
    }
    Ok(addrs)
}

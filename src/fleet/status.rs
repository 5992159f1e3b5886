//! # Public node fields for the fleet status surface.
//!
//! The HTTP transport serving these lives outside this crate; the fleet only
//! produces the structured data. One [`NodeStatus`] per node, listing the
//! addresses, data directory, and the jobs currently running.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::node::NodeHandle;
use crate::subscribers::JobTracker;

/// Public fields of one node, as served by the external status endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Address of the node's HTTP API.
    pub api_addr: String,
    /// Gateway peer address.
    pub peer_addr: String,
    /// Host RPC address.
    pub rpc_addr: String,
    /// The node's data directory.
    pub data_dir: PathBuf,
    /// Whether the handle currently holds a live node.
    pub running: bool,
    /// Names of the jobs currently running, sorted.
    pub jobs: Vec<String>,
}

impl NodeStatus {
    /// Snapshots one handle's public fields.
    pub(crate) async fn collect(handle: &NodeHandle, tracker: &JobTracker) -> Self {
        let config = handle.config();
        Self {
            api_addr: config.api_addr.clone(),
            peer_addr: config.peer_addr.clone(),
            rpc_addr: config.rpc_addr.clone(),
            data_dir: config.data_dir.clone(),
            running: handle.is_running().await,
            jobs: tracker.jobs_for(&config.dir_tag()).await,
        }
    }
}

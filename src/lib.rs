//! # nodefarm
//!
//! **nodefarm** orchestrates a small fleet of external consensus-node
//! processes for integration testing: it starts and stops node processes,
//! wires their peer-to-peer connections into test topologies, runs
//! long-lived background behaviors against each node, and detects whether
//! the fleet has split into divergent consensus groups.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  NodeConfig  │   │  NodeConfig  │   │  NodeConfig  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Fleet (orchestrator)                                             │
//! │  - Bus (broadcast events) + LogWriter / JobTracker subscribers    │
//! │  - SyncGate (one-shot fleet readiness gate)                       │
//! │  - connect_peers / consensus_groups / await_sync / status         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐
//!   │NodeHandle│      │NodeHandle│      │NodeHandle│   one per node:
//!   └────┬─────┘      └────┬─────┘      └────┬─────┘   process + client
//!        ▼                  ▼                  ▼        + JobScheduler
//!   ┌──────────────────────────────────────────────┐
//!   │  JobScheduler (per node)                     │
//!   │  - wallet bootstrap (one seed per node)      │
//!   │  - WorkGroup: admit / cancel / drain         │
//!   │  - jobs: "balance" · "gateway" · "miner"     │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! ### Job lifecycle
//! ```text
//! start_job(name) ──► registry lookup ──► WorkGroup::try_enter()
//!                          │                    │
//!                   unknown name          Err(Stopped) once draining
//!                   Err(Unknown)                │
//!                                               ▼
//!                                   spawned task (guard moved in)
//!                                               │
//!                             wait on SyncGate (raced vs stop)
//!                                               │
//!                          loop { select: stop ─► return,
//!                                         timer ─► poll node API }
//!
//! scheduler.stop() ─► cancel + drain: zero tasks remain on return
//! ```
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use nodefarm::{Fleet, FleetConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: FleetConfig = serde_json::from_str(r#"{
//!         "data_dir": "/tmp/fleet",
//!         "nodes": [{
//!             "api_addr": "127.0.0.1:9980",
//!             "peer_addr": "127.0.0.1:9981",
//!             "rpc_addr": "127.0.0.1:9982",
//!             "data_dir": "/tmp/fleet/node0",
//!             "binary": "/usr/local/bin/noded",
//!             "jobs": ["balance", "gateway"]
//!         }]
//!     }"#)?;
//!
//!     let fleet = Fleet::new(config, Vec::new()).await?;
//!     fleet.await_sync(Duration::from_secs(300)).await?;
//!
//!     // A healthy fleet forms exactly one consensus group.
//!     let groups = fleet.consensus_groups().await?;
//!     assert_eq!(groups.len(), 1);
//!
//!     fleet.close().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod fleet;
pub mod jobs;
pub mod node;
pub mod subscribers;
pub mod sync;

// ---- Public re-exports ----

pub use client::{HttpClient, NodeApi};
pub use config::{FleetConfig, NodeConfig};
pub use error::{FleetError, JobError, NodeError, Stopped};
pub use fleet::{Fleet, NodeStatus};
pub use jobs::{Job, JobCtx, JobScheduler};
pub use node::NodeHandle;
pub use subscribers::Subscribe;
pub use sync::{SyncGate, WorkGroup};

//! # Node API surface consumed by the orchestration layer.
//!
//! [`NodeApi`] lists exactly the endpoints the fleet and its jobs need:
//! wallet bootstrap, miner control, gateway peering, and the consensus tip.
//! Renter-style traffic jobs live outside this crate and bring their own
//! client extensions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currency amount in base units.
///
/// Wide enough for any balance a test fleet can mine; arithmetic stays in
/// integer space.
pub type Currency = u128;

/// Errors produced by node API calls.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The endpoint is not serving; used by health polling and simulated
    /// transports.
    #[error("node unavailable: {0}")]
    Unavailable(String),
}

/// Wallet state as reported by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    /// Whether a wallet has been initialized (seeded) on this node.
    pub encrypted: bool,
    /// Whether the wallet is currently unlocked.
    pub unlocked: bool,
    /// Confirmed balance in base units.
    pub confirmed_balance: Currency,
}

/// Response of a fresh wallet initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInit {
    /// The generated primary seed; the node's only disclosure of it.
    pub primary_seed: String,
}

/// Miner run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerStatus {
    /// Whether the miner is currently running.
    pub mining: bool,
}

/// One gateway peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// The peer's gateway address (`host:port`).
    pub addr: String,
}

/// The node's current chain tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    /// Current chain height.
    pub height: u64,
    /// Identifier of the block at that height.
    pub block_id: String,
}

/// # Client for one node's API.
///
/// One instance per node, exclusively owned by that node's handle and
/// scheduler. All methods are cheap request/response calls; long-running
/// behavior is composed out of them by the jobs.
#[async_trait]
pub trait NodeApi: Send + Sync + 'static {
    /// Wallet state, including the confirmed balance.
    async fn wallet(&self) -> Result<WalletInfo, ClientError>;

    /// Initializes a fresh wallet and returns its generated seed.
    async fn wallet_init(&self) -> Result<WalletInit, ClientError>;

    /// Initializes the wallet from an existing seed.
    async fn wallet_init_seed(&self, seed: &str) -> Result<(), ClientError>;

    /// Unlocks the wallet with the given seed.
    async fn wallet_unlock(&self, seed: &str) -> Result<(), ClientError>;

    /// Current miner run state.
    async fn miner_status(&self) -> Result<MinerStatus, ClientError>;

    /// Starts the miner. Starting a running miner is a no-op success.
    async fn miner_start(&self) -> Result<(), ClientError>;

    /// Stops the miner. Stopping a stopped miner is a no-op success.
    async fn miner_stop(&self) -> Result<(), ClientError>;

    /// Currently connected gateway peers.
    async fn peers(&self) -> Result<Vec<Peer>, ClientError>;

    /// Connects this node's gateway to the peer at `addr`.
    ///
    /// Connecting to an already-connected peer is a no-op success.
    async fn connect_peer(&self, addr: &str) -> Result<(), ClientError>;

    /// Current chain height and the identifier of the block at that height.
    ///
    /// Doubles as the health probe: a node answering this is reachable.
    async fn chain_tip(&self) -> Result<ChainTip, ClientError>;
}

//! Typed client for the node's HTTP API.
//!
//! [`NodeApi`] is the seam between the orchestration layer and the node
//! process: jobs and the fleet only ever talk through the trait. The
//! production implementation is [`HttpClient`]; tests drive the same
//! machinery against an in-memory stub.

mod api;
mod http;

#[cfg(test)]
pub(crate) mod stub;

pub use api::{ChainTip, ClientError, Currency, MinerStatus, NodeApi, Peer, WalletInfo, WalletInit};
pub use http::HttpClient;

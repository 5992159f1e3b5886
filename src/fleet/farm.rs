//! # Fleet: the orchestrator over all node handles.
//!
//! Owns the set of [`NodeHandle`]s, the event bus with its subscribers, and
//! the fleet [`SyncGate`]. Construction starts every configured node (tearing
//! down the started ones if any fails), wires the peer topology, and leaves
//! the gate for [`Fleet::await_sync`] to release once the fleet agrees on a
//! single chain tip.
//!
//! ## Consensus partitioning
//! [`Fleet::consensus_groups`] is how tests detect network splits: every
//! node reporting the same `(height, block id)` pair lands in one group, so
//! a healthy fleet yields exactly one group containing every handle, and an
//! isolated or desynced node shows up as an extra singleton. Groups are
//! recomputed fresh on every query, never cached, and a query failure for
//! any node fails the whole computation — a partial partition would be
//! quietly wrong in exactly the situations the tests exist to catch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::client::{ChainTip, ClientError};
use crate::config::FleetConfig;
use crate::error::{FleetError, NodeError};
use crate::events::{Bus, Event, EventKind};
use crate::fleet::NodeStatus;
use crate::node::NodeHandle;
use crate::subscribers::{spawn_listener, JobTracker, LogWriter, Subscribe};
use crate::sync::SyncGate;

/// Interval between consensus polls while waiting for initial sync.
const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Orchestrates a fleet of nodes for one integration-test run.
pub struct Fleet {
    config: FleetConfig,
    nodes: Vec<Arc<NodeHandle>>,
    gate: SyncGate,
    bus: Bus,
    tracker: JobTracker,
}

impl Fleet {
    /// Builds the fleet: starts every configured node, attaches the logging
    /// and job-tracking subscribers plus any supplied ones, and wires the
    /// peer topology.
    ///
    /// If any node fails to start, the already-started nodes are stopped and
    /// the construction error propagates; no partial fleet is returned.
    pub async fn new(
        config: FleetConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, FleetError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|source| NodeError::Io {
            data_dir: config.data_dir.clone(),
            source,
        })?;

        let bus = Bus::default();
        let gate = SyncGate::new();
        let tracker = JobTracker::new();
        spawn_listener(&bus, Arc::new(LogWriter));
        spawn_listener(&bus, Arc::new(tracker.clone()));
        for sub in subscribers {
            spawn_listener(&bus, sub);
        }

        let mut nodes: Vec<Arc<NodeHandle>> = Vec::with_capacity(config.nodes.len());
        for node_config in &config.nodes {
            match NodeHandle::start(node_config.clone(), bus.clone(), gate.clone()).await {
                Ok(handle) => nodes.push(handle),
                Err(e) => {
                    join_all(nodes.iter().map(|n| n.stop())).await;
                    return Err(e.into());
                }
            }
        }

        if nodes.len() >= 2 {
            Self::connect_peers(&nodes, &bus).await?;
        }

        Ok(Self {
            config,
            nodes,
            gate,
            bus,
            tracker,
        })
    }

    /// The fleet's configuration.
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// The fleet's node handles, in configuration order.
    pub fn handles(&self) -> &[Arc<NodeHandle>] {
        &self.nodes
    }

    /// The fleet readiness gate. Released by [`await_sync`](Self::await_sync),
    /// or directly by an operator that judges readiness some other way.
    pub fn gate(&self) -> &SyncGate {
        &self.gate
    }

    /// The fleet's event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Finds the handle managing `data_dir`.
    pub fn node_at(&self, data_dir: &Path) -> Option<Arc<NodeHandle>> {
        self.nodes
            .iter()
            .find(|n| n.config().data_dir == data_dir)
            .cloned()
    }

    /// Connects every handle's gateway to the first handle (the hub).
    ///
    /// Requires at least two handles. Individual connection failures are
    /// published as [`EventKind::PeerConnectFailed`] and tolerated — one
    /// refusing node should not abort wiring the rest. Idempotent: a node
    /// already peered with the hub is skipped.
    pub async fn connect_peers(
        handles: &[Arc<NodeHandle>],
        bus: &Bus,
    ) -> Result<(), FleetError> {
        if handles.len() < 2 {
            return Err(FleetError::InsufficientPeers {
                got: handles.len(),
            });
        }

        let hub_addr = handles[0].config().peer_addr.clone();
        for other in &handles[1..] {
            let dir = other.config().dir_tag();
            let Some(client) = other.client().await else {
                bus.publish(
                    Event::new(EventKind::PeerConnectFailed)
                        .with_dir(dir.as_str())
                        .with_reason("node is stopped"),
                );
                continue;
            };
            if let Ok(peers) = client.peers().await {
                if peers.iter().any(|p| p.addr == hub_addr) {
                    continue;
                }
            }
            if let Err(e) = client.connect_peer(&hub_addr).await {
                bus.publish(
                    Event::new(EventKind::PeerConnectFailed)
                        .with_dir(dir.as_str())
                        .with_reason(e.to_string()),
                );
            }
        }
        Ok(())
    }

    /// Partitions the fleet's handles by reported chain tip.
    pub async fn consensus_groups(&self) -> Result<Vec<Vec<Arc<NodeHandle>>>, FleetError> {
        Self::consensus_groups_of(&self.nodes).await
    }

    /// Partitions `handles` into consensus groups.
    ///
    /// Handles reporting an identical `(height, block id)` pair share a
    /// group; the first handle encountered with a new tip anchors a new
    /// group. Group *membership* is the contract — callers must not rely on
    /// group order beyond first-seen anchoring. Any query failure fails the
    /// whole computation with [`FleetError::ConsensusQuery`].
    pub async fn consensus_groups_of(
        handles: &[Arc<NodeHandle>],
    ) -> Result<Vec<Vec<Arc<NodeHandle>>>, FleetError> {
        let mut groups: Vec<(ChainTip, Vec<Arc<NodeHandle>>)> = Vec::new();
        for handle in handles {
            let query_err = |source| FleetError::ConsensusQuery {
                data_dir: handle.config().data_dir.clone(),
                source,
            };
            let client = handle
                .client()
                .await
                .ok_or_else(|| query_err(ClientError::Unavailable("node is stopped".into())))?;
            let tip = client.chain_tip().await.map_err(query_err)?;

            match groups.iter_mut().find(|(t, _)| *t == tip) {
                Some((_, members)) => members.push(Arc::clone(handle)),
                None => groups.push((tip, vec![Arc::clone(handle)])),
            }
        }
        Ok(groups.into_iter().map(|(_, members)| members).collect())
    }

    /// Polls until the whole fleet reports one chain tip, then releases the
    /// gate. This is the "operator decides the fleet is ready" moment.
    ///
    /// Query failures while nodes warm up are tolerated and retried. On
    /// timeout the gate stays unreleased and [`FleetError::SyncTimeout`]
    /// reports how many groups remained.
    pub async fn await_sync(&self, timeout: Duration) -> Result<(), FleetError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_groups = 0;
        loop {
            match self.consensus_groups().await {
                Ok(groups) => {
                    last_groups = groups.len();
                    if groups.len() == 1 {
                        self.bus.publish(
                            Event::new(EventKind::FleetSynced)
                                .with_reason(format!("{} nodes on one tip", groups[0].len())),
                        );
                        self.gate.release();
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "consensus query while waiting for sync");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FleetError::SyncTimeout {
                    timeout,
                    groups: last_groups,
                });
            }
            tokio::time::sleep(SYNC_POLL_INTERVAL).await;
        }
    }

    /// Public fields of every node, for the external status endpoint.
    pub async fn status(&self) -> Vec<NodeStatus> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for handle in &self.nodes {
            out.push(NodeStatus::collect(handle, &self.tracker).await);
        }
        out
    }

    /// Stops every node. All stops are attempted regardless of individual
    /// failures; the first failure is returned.
    pub async fn close(&self) -> Result<(), FleetError> {
        let results = join_all(self.nodes.iter().map(|n| n.stop())).await;
        for res in results {
            res?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stub::StubNode;
    use crate::jobs::{names, testutil::test_config};
    use std::path::PathBuf;

    /// A handle attached to a stub node with the given tip, wired into the
    /// shared bus/gate pair.
    async fn stub_handle(
        idx: usize,
        tip: (u64, &str),
        bus: &Bus,
        gate: &SyncGate,
    ) -> (Arc<NodeHandle>, Arc<StubNode>) {
        let stub = Arc::new(StubNode::with_tip(tip.0, tip.1));
        let mut config = test_config(&format!("/tmp/fleet-test/node{idx}"));
        config.api_addr = format!("127.0.0.1:{}", 10_000 + idx);
        config.peer_addr = format!("127.0.0.1:{}", 11_000 + idx);
        config.rpc_addr = format!("127.0.0.1:{}", 12_000 + idx);
        let handle = NodeHandle::connect(config, Arc::clone(&stub) as _, bus.clone(), gate.clone())
            .await
            .unwrap();
        (handle, stub)
    }

    fn test_fleet(nodes: Vec<Arc<NodeHandle>>, bus: Bus, gate: SyncGate) -> Fleet {
        Fleet {
            config: FleetConfig {
                data_dir: PathBuf::from("/tmp/fleet-test"),
                nodes: nodes.iter().map(|n| n.config().clone()).collect(),
            },
            nodes,
            gate,
            bus,
            tracker: JobTracker::new(),
        }
    }

    #[tokio::test]
    async fn test_single_group_when_all_tips_match() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let mut handles = Vec::new();
        for idx in 0..3 {
            let (handle, _) = stub_handle(idx, (100, "block-x"), &bus, &gate).await;
            handles.push(handle);
        }

        let groups = Fleet::consensus_groups_of(&handles).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[tokio::test]
    async fn test_desynced_node_forms_second_group() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let mut handles = Vec::new();
        for idx in 0..3 {
            let (handle, _) = stub_handle(idx, (100, "block-x"), &bus, &gate).await;
            handles.push(handle);
        }
        let (loner, _) = stub_handle(3, (50, "block-y"), &bus, &gate).await;
        handles.push(Arc::clone(&loner));

        let groups = Fleet::consensus_groups_of(&handles).await.unwrap();
        assert_eq!(groups.len(), 2);
        let mut sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3]);
        // Membership, not order, is the contract.
        let singleton = groups.iter().find(|g| g.len() == 1).unwrap();
        assert!(Arc::ptr_eq(&singleton[0], &loner));
    }

    #[tokio::test]
    async fn test_same_height_different_block_id_splits() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let (a, _) = stub_handle(0, (100, "block-x"), &bus, &gate).await;
        let (b, _) = stub_handle(1, (100, "block-z"), &bus, &gate).await;

        let groups = Fleet::consensus_groups_of(&[a, b]).await.unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_fails_whole_computation() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let (a, _) = stub_handle(0, (100, "block-x"), &bus, &gate).await;
        let (b, stub_b) = stub_handle(1, (100, "block-x"), &bus, &gate).await;
        stub_b.mutate(|s| s.offline = true);

        let err = Fleet::consensus_groups_of(&[a, b]).await.unwrap_err();
        assert_eq!(err.as_label(), "fleet_consensus_query");
    }

    #[tokio::test]
    async fn test_connect_peers_requires_two_handles() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let (only, _) = stub_handle(0, (0, "genesis"), &bus, &gate).await;

        let err = Fleet::connect_peers(&[only], &bus).await.unwrap_err();
        assert!(matches!(err, FleetError::InsufficientPeers { got: 1 }));
    }

    #[tokio::test]
    async fn test_connect_peers_wires_everyone_to_the_hub() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let mut handles = Vec::new();
        let mut stubs = Vec::new();
        for idx in 0..3 {
            let (handle, stub) = stub_handle(idx, (0, "genesis"), &bus, &gate).await;
            handles.push(handle);
            stubs.push(stub);
        }

        Fleet::connect_peers(&handles, &bus).await.unwrap();

        let hub_addr = handles[0].config().peer_addr.clone();
        for stub in &stubs[1..] {
            stub.snapshot(|s| {
                assert!(s.peers.iter().any(|p| p.addr == hub_addr));
            });
        }
        // Re-wiring is a no-op: everyone already peers with the hub.
        Fleet::connect_peers(&handles, &bus).await.unwrap();
        for stub in &stubs[1..] {
            stub.snapshot(|s| assert_eq!(s.connected.len(), 1));
        }
    }

    #[tokio::test]
    async fn test_connect_peers_tolerates_individual_failures() {
        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let gate = SyncGate::new();
        let (hub, _) = stub_handle(0, (0, "genesis"), &bus, &gate).await;
        let (ok, ok_stub) = stub_handle(1, (0, "genesis"), &bus, &gate).await;
        let (bad, bad_stub) = stub_handle(2, (0, "genesis"), &bus, &gate).await;
        bad_stub.mutate(|s| s.fail_connect = true);

        let hub_addr = hub.config().peer_addr.clone();
        Fleet::connect_peers(&[hub, ok, bad], &bus).await.unwrap();

        // The healthy node still got wired.
        ok_stub.snapshot(|s| {
            assert!(s.peers.iter().any(|p| p.addr == hub_addr));
        });
        // The failure was reported, not swallowed.
        let mut saw_failure = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::PeerConnectFailed {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_sync_releases_gate_on_single_group() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let mut handles = Vec::new();
        for idx in 0..2 {
            let (handle, _) = stub_handle(idx, (7, "block-s"), &bus, &gate).await;
            handles.push(handle);
        }
        let fleet = test_fleet(handles, bus, gate);

        assert!(!fleet.gate().is_released());
        fleet.await_sync(Duration::from_secs(30)).await.unwrap();
        assert!(fleet.gate().is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_sync_times_out_without_convergence() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let (a, _) = stub_handle(0, (7, "block-s"), &bus, &gate).await;
        let (b, _) = stub_handle(1, (9, "block-t"), &bus, &gate).await;
        let fleet = test_fleet(vec![a, b], bus, gate);

        let err = fleet.await_sync(Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(
            err,
            FleetError::SyncTimeout { groups: 2, .. }
        ));
        assert!(!fleet.gate().is_released());
    }

    #[tokio::test]
    async fn test_close_stops_every_node() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        gate.release();
        let mut handles = Vec::new();
        for idx in 0..3 {
            let (handle, _) = stub_handle(idx, (0, "genesis"), &bus, &gate).await;
            handles.push(handle);
        }
        handles[0].start_job(names::GATEWAY).await.unwrap();
        let fleet = test_fleet(handles, bus, gate);

        fleet.close().await.unwrap();
        for handle in fleet.handles() {
            assert!(!handle.is_running().await);
        }
        // Closing twice is as idempotent as the underlying stops.
        fleet.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_reports_public_fields_and_jobs() {
        let bus = Bus::default();
        let gate = SyncGate::new();
        let (handle, _) = stub_handle(0, (0, "genesis"), &bus, &gate).await;
        let fleet = test_fleet(vec![Arc::clone(&handle)], bus, gate);

        // Feed the tracker directly; the bus listener is wired the same way
        // in Fleet::new.
        fleet
            .tracker
            .on_event(
                &Event::new(EventKind::JobStarting)
                    .with_caller(names::BALANCE)
                    .with_dir(handle.config().dir_tag().as_str()),
            )
            .await;

        let status = fleet.status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].api_addr, handle.config().api_addr);
        assert!(status[0].running);
        assert_eq!(status[0].jobs, vec![names::BALANCE.to_string()]);

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("api_addr"));
    }
}

//! # Gateway connectivity monitor.
//!
//! Purely observational: reports an error-level event whenever the node has
//! fewer than two peers (a single peer is typically the node's own
//! loop-back). Never takes corrective action and never terminates except on
//! the stop signal, so connectivity regressions stay visible in the log
//! stream without the monitor itself perturbing the network.

use std::time::Duration;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::jobs::{names, Job, JobCtx};

/// Initial wait after the fleet gate releases, giving the other nodes time
/// to spin up before peer counts mean anything.
const WARMUP: Duration = Duration::from_secs(60);

/// How often the peer count is checked.
const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Fewer peers than this is reported; one peer is usually a self-loop.
const MIN_PEERS: usize = 2;

/// Watches the node's peer count and reports regressions.
pub struct GatewayMonitor;

#[async_trait]
impl Job for GatewayMonitor {
    fn name(&self) -> &'static str {
        names::GATEWAY
    }

    async fn run(&self, ctx: JobCtx) {
        if !ctx.wait_synced().await {
            return;
        }
        if !ctx.sleep(WARMUP).await {
            return;
        }

        loop {
            if !ctx.sleep(CHECK_INTERVAL).await {
                return;
            }

            match ctx.client.peers().await {
                Ok(peers) => {
                    if peers.len() < MIN_PEERS {
                        ctx.bus.publish(
                            Event::new(EventKind::LowPeerCount)
                                .with_caller(names::GATEWAY)
                                .with_dir(std::sync::Arc::clone(&ctx.dir))
                                .with_peers(peers.len()),
                        );
                    }
                }
                Err(e) => {
                    ctx.report_retry(
                        names::GATEWAY,
                        format!("can't query gateway peers: {e}"),
                        CHECK_INTERVAL,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{CHECK_INTERVAL, WARMUP};
    use crate::client::stub::StubNode;
    use crate::client::Peer;
    use crate::events::{Bus, EventKind};
    use crate::jobs::testutil::test_config;
    use crate::jobs::{names, JobScheduler};
    use crate::sync::SyncGate;

    fn peers(n: usize) -> Vec<Peer> {
        (0..n)
            .map(|i| Peer {
                addr: format!("127.0.0.1:{}", 20_000 + i),
            })
            .collect()
    }

    async fn gateway_scheduler(stub: Arc<StubNode>, bus: Bus) -> JobScheduler {
        let gate = SyncGate::new();
        gate.release();
        let sched = JobScheduler::new(stub, gate, bus, test_config("/tmp/gateway-test"), None)
            .await
            .unwrap();
        sched.start_job(names::GATEWAY).unwrap();
        sched
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_low_peer_count() {
        let stub = Arc::new(StubNode::new());
        stub.mutate(|s| s.peers = peers(1));

        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let sched = gateway_scheduler(stub, bus).await;

        // First check fires at warm-up + interval.
        tokio::time::sleep(WARMUP + CHECK_INTERVAL + Duration::from_secs(1)).await;
        sched.stop().await;

        let mut reported = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::LowPeerCount {
                reported = Some(ev);
            }
        }
        let ev = reported.expect("one peer must be reported");
        assert_eq!(ev.peers, Some(1));
        assert_eq!(ev.caller.as_deref(), Some(names::GATEWAY));
        assert_eq!(ev.dir.as_deref(), Some("/tmp/gateway-test"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_peer_count_is_silent() {
        let stub = Arc::new(StubNode::new());
        stub.mutate(|s| s.peers = peers(3));

        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let sched = gateway_scheduler(stub, bus).await;

        tokio::time::sleep(WARMUP + CHECK_INTERVAL * 3).await;
        sched.stop().await;

        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev.kind, EventKind::LowPeerCount);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_check_before_warmup() {
        let stub = Arc::new(StubNode::new());
        stub.mutate(|s| s.peers = peers(0));

        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let sched = gateway_scheduler(stub, bus).await;

        tokio::time::sleep(WARMUP / 2).await;
        sched.stop().await;

        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev.kind, EventKind::LowPeerCount);
        }
    }
}

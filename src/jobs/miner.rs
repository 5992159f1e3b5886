//! # Continuous miner job.
//!
//! Turns the node into a dedicated block producer: once the fleet gate
//! releases, the miner is started (retrying transient failures) and left
//! running until the stop signal, with a best-effort stop on the way out.
//! Useful for funding a fleet or deliberately desyncing one node in
//! partition tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::jobs::{names, Job, JobCtx};

/// How long to wait before retrying a failed miner start.
const START_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Mines continuously for the job's entire lifetime.
pub struct Miner;

#[async_trait]
impl Job for Miner {
    fn name(&self) -> &'static str {
        names::MINER
    }

    async fn run(&self, ctx: JobCtx) {
        if !ctx.wait_synced().await {
            return;
        }

        loop {
            match ctx.client.miner_start().await {
                Ok(()) => {
                    ctx.bus.publish(
                        Event::new(EventKind::MinerStarted)
                            .with_caller(names::MINER)
                            .with_dir(std::sync::Arc::clone(&ctx.dir)),
                    );
                    break;
                }
                Err(e) => {
                    ctx.report_retry(
                        names::MINER,
                        format!("can't start miner: {e}"),
                        START_RETRY_INTERVAL,
                    );
                    if !ctx.sleep(START_RETRY_INTERVAL).await {
                        return;
                    }
                }
            }
        }

        ctx.stopped().await;

        // Shutdown is already in progress; a failed stop only matters to the
        // process we are about to terminate anyway.
        if ctx.client.miner_stop().await.is_ok() {
            ctx.bus.publish(
                Event::new(EventKind::MinerStopped)
                    .with_caller(names::MINER)
                    .with_dir(std::sync::Arc::clone(&ctx.dir)),
            );
        }
    }
}

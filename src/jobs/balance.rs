//! # Balance maintainer: the miner on/off state machine.
//!
//! Keeps a node's confirmed balance hovering around a target by toggling its
//! miner:
//!
//! ```text
//!            balance ≤ target                balance > target
//! MinerOff ───────────────────► MinerOn ───────────────────► MinerOff
//!            miner_start                      miner_stop
//! ```
//!
//! The initial state is queried from the node, reflecting whatever the
//! miner's actual run state is, rather than assumed. A failed query or a
//! failed start/stop command is reported on the bus, leaves the state
//! unchanged, and backs off for a short fixed interval; transient failures
//! never terminate the job.
//!
//! The job blocks on the fleet gate before its first iteration — mining
//! before the fleet is wired risks an isolated, wasted chain.

use std::time::Duration;

use async_trait::async_trait;

use crate::client::Currency;
use crate::events::{Event, EventKind};
use crate::jobs::{names, Job, JobCtx};

/// How often the confirmed balance is checked.
const BALANCE_CHECK_INTERVAL: Duration = Duration::from_secs(20);

/// How long the maintainer sleeps after a failed query or command.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MinerState {
    Off,
    On,
}

/// Mines while the confirmed balance is at or below the target, throttles
/// the miner once it exceeds it.
pub struct BalanceMaintainer {
    target: Currency,
}

impl BalanceMaintainer {
    /// Creates a maintainer aiming for `target` base units.
    pub fn new(target: Currency) -> Self {
        Self { target }
    }

    fn transition(&self, ev: EventKind, ctx: &JobCtx, balance: Currency) -> Event {
        Event::new(ev)
            .with_caller(names::BALANCE)
            .with_dir(std::sync::Arc::clone(&ctx.dir))
            .with_reason(format!("confirmed balance {balance}"))
    }
}

#[async_trait]
impl Job for BalanceMaintainer {
    fn name(&self) -> &'static str {
        names::BALANCE
    }

    async fn run(&self, ctx: JobCtx) {
        if !ctx.wait_synced().await {
            return;
        }

        // Start from the miner's actual run state.
        let mut state = loop {
            match ctx.client.miner_status().await {
                Ok(status) => {
                    break if status.mining {
                        MinerState::On
                    } else {
                        MinerState::Off
                    }
                }
                Err(e) => {
                    ctx.report_retry(
                        names::BALANCE,
                        format!("can't query miner state: {e}"),
                        ERROR_BACKOFF,
                    );
                    if !ctx.sleep(ERROR_BACKOFF).await {
                        return;
                    }
                }
            }
        };

        loop {
            let balance = match ctx.client.wallet().await {
                Ok(info) => info.confirmed_balance,
                Err(e) => {
                    ctx.report_retry(
                        names::BALANCE,
                        format!("can't get wallet info: {e}"),
                        ERROR_BACKOFF,
                    );
                    if !ctx.sleep(ERROR_BACKOFF).await {
                        return;
                    }
                    continue;
                }
            };

            let needs_funds = balance <= self.target;
            match (state, needs_funds) {
                (MinerState::Off, true) => match ctx.client.miner_start().await {
                    Ok(()) => {
                        state = MinerState::On;
                        ctx.bus
                            .publish(self.transition(EventKind::MinerStarted, &ctx, balance));
                    }
                    Err(e) => {
                        ctx.report_retry(
                            names::BALANCE,
                            format!("can't start miner: {e}"),
                            ERROR_BACKOFF,
                        );
                        if !ctx.sleep(ERROR_BACKOFF).await {
                            return;
                        }
                        continue;
                    }
                },
                (MinerState::On, false) => match ctx.client.miner_stop().await {
                    Ok(()) => {
                        state = MinerState::Off;
                        ctx.bus
                            .publish(self.transition(EventKind::MinerStopped, &ctx, balance));
                    }
                    Err(e) => {
                        ctx.report_retry(
                            names::BALANCE,
                            format!("can't stop miner: {e}"),
                            ERROR_BACKOFF,
                        );
                        if !ctx.sleep(ERROR_BACKOFF).await {
                            return;
                        }
                        continue;
                    }
                },
                _ => {}
            }

            if !ctx.sleep(BALANCE_CHECK_INTERVAL).await {
                return;
            }
        }
    }
}

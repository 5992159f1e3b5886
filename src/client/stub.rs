//! In-memory [`NodeApi`] stub for tests.
//!
//! Holds scripted node state behind a mutex so tests can drive jobs and
//! fleet operations against controllable balances, peers, and chain tips,
//! then assert on the calls the code under test issued.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::api::{
    ChainTip, ClientError, Currency, MinerStatus, NodeApi, Peer, WalletInfo, WalletInit,
};

#[derive(Debug)]
pub(crate) struct StubState {
    pub encrypted: bool,
    pub unlocked: bool,
    pub seed: Option<String>,
    pub init_calls: usize,
    pub init_seed_calls: usize,
    pub unlock_calls: usize,
    /// Balances returned by successive `wallet()` calls; the last value
    /// repeats once the script runs out.
    pub balances: VecDeque<Currency>,
    pub last_balance: Currency,
    pub mining: bool,
    pub miner_starts: usize,
    pub miner_stops: usize,
    pub peers: Vec<Peer>,
    /// Addresses passed to `connect_peer`, in call order.
    pub connected: Vec<String>,
    pub tip: ChainTip,
    /// When set, `wallet()` fails once with `Unavailable` and clears.
    pub fail_next_wallet: bool,
    /// When set, every `connect_peer` fails.
    pub fail_connect: bool,
    /// When set, every call fails with `Unavailable`, as if the endpoint
    /// were not serving at all.
    pub offline: bool,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            encrypted: false,
            unlocked: false,
            seed: None,
            init_calls: 0,
            init_seed_calls: 0,
            unlock_calls: 0,
            balances: VecDeque::new(),
            last_balance: 0,
            mining: false,
            miner_starts: 0,
            miner_stops: 0,
            peers: Vec::new(),
            connected: Vec::new(),
            tip: ChainTip {
                height: 0,
                block_id: "genesis".into(),
            },
            fail_next_wallet: false,
            fail_connect: false,
            offline: false,
        }
    }
}

pub(crate) struct StubNode {
    state: Mutex<StubState>,
}

impl StubNode {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
        }
    }

    pub(crate) fn with_tip(height: u64, block_id: &str) -> Self {
        let stub = Self::new();
        stub.mutate(|s| {
            s.tip = ChainTip {
                height,
                block_id: block_id.into(),
            }
        });
        stub
    }

    /// Scripts the balances successive `wallet()` calls observe.
    pub(crate) fn script_balances(&self, balances: impl IntoIterator<Item = Currency>) {
        self.mutate(|s| s.balances = balances.into_iter().collect());
    }

    pub(crate) fn mutate(&self, f: impl FnOnce(&mut StubState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub(crate) fn snapshot<T>(&self, f: impl FnOnce(&StubState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn ensure_online(s: &StubState) -> Result<(), ClientError> {
        if s.offline {
            Err(ClientError::Unavailable("endpoint offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NodeApi for StubNode {
    async fn wallet(&self) -> Result<WalletInfo, ClientError> {
        let mut s = self.state.lock().unwrap();
        Self::ensure_online(&s)?;
        if s.fail_next_wallet {
            s.fail_next_wallet = false;
            return Err(ClientError::Unavailable("wallet stub offline".into()));
        }
        if let Some(balance) = s.balances.pop_front() {
            s.last_balance = balance;
        }
        Ok(WalletInfo {
            encrypted: s.encrypted,
            unlocked: s.unlocked,
            confirmed_balance: s.last_balance,
        })
    }

    async fn wallet_init(&self) -> Result<WalletInit, ClientError> {
        let mut s = self.state.lock().unwrap();
        s.init_calls += 1;
        let seed = format!("stub-seed-{}", s.init_calls);
        s.encrypted = true;
        s.seed = Some(seed.clone());
        Ok(WalletInit { primary_seed: seed })
    }

    async fn wallet_init_seed(&self, seed: &str) -> Result<(), ClientError> {
        let mut s = self.state.lock().unwrap();
        if s.encrypted {
            return Err(ClientError::Api {
                status: 400,
                message: "wallet is already encrypted".into(),
            });
        }
        s.init_seed_calls += 1;
        s.encrypted = true;
        s.seed = Some(seed.into());
        Ok(())
    }

    async fn wallet_unlock(&self, seed: &str) -> Result<(), ClientError> {
        let mut s = self.state.lock().unwrap();
        if s.seed.as_deref() != Some(seed) {
            return Err(ClientError::Api {
                status: 400,
                message: "provided seed does not match the wallet".into(),
            });
        }
        s.unlock_calls += 1;
        s.unlocked = true;
        Ok(())
    }

    async fn miner_status(&self) -> Result<MinerStatus, ClientError> {
        Ok(MinerStatus {
            mining: self.state.lock().unwrap().mining,
        })
    }

    async fn miner_start(&self) -> Result<(), ClientError> {
        let mut s = self.state.lock().unwrap();
        s.mining = true;
        s.miner_starts += 1;
        Ok(())
    }

    async fn miner_stop(&self) -> Result<(), ClientError> {
        let mut s = self.state.lock().unwrap();
        s.mining = false;
        s.miner_stops += 1;
        Ok(())
    }

    async fn peers(&self) -> Result<Vec<Peer>, ClientError> {
        Ok(self.state.lock().unwrap().peers.clone())
    }

    async fn connect_peer(&self, addr: &str) -> Result<(), ClientError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_connect {
            return Err(ClientError::Unavailable("gateway stub refusing".into()));
        }
        s.connected.push(addr.into());
        let peer = Peer { addr: addr.into() };
        if !s.peers.contains(&peer) {
            s.peers.push(peer);
        }
        Ok(())
    }

    async fn chain_tip(&self) -> Result<ChainTip, ClientError> {
        let s = self.state.lock().unwrap();
        Self::ensure_online(&s)?;
        Ok(s.tip.clone())
    }
}

//! Account state synchronizer.
//!
//! Keeps a cache of the account's native and token balances fresh with two
//! independent periodic cycles. At most one read per asset is in flight;
//! a failed read leaves that asset's cached value alone and does not stop
//! its siblings.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::mpsc::UnboundedReceiver,
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::{
    config::{SyncConfig, TokenConfig},
    domain::{
        amount::{format_units, NATIVE_DECIMALS},
        token,
    },
    infra::gateway::{ChainGateway, GatewayError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AssetId {
    Native,
    Token(Address),
}

/// Request for an out-of-band refresh, e.g. after a confirmed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshHint {
    Native,
    Tokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedBalance {
    /// Balance in the asset's minor units.
    pub raw: U256,
    pub decimals: u8,
    pub refreshed_at: DateTime<Utc>,
}

impl CachedBalance {
    /// `raw / 10^decimals` as an exact decimal string.
    pub fn value(&self) -> String {
        format_units(self.raw, self.decimals)
    }
}

/// Balances keyed by asset. Written only by [`BalanceSynchronizer`].
#[derive(Debug, Default)]
pub struct BalanceCache {
    entries: RwLock<HashMap<AssetId, CachedBalance>>,
}

impl BalanceCache {
    pub fn get(&self, asset: &AssetId) -> Option<CachedBalance> {
        self.read().get(asset).cloned()
    }

    /// All cached balances, native first, then tokens by address.
    pub fn snapshot(&self) -> Vec<(AssetId, CachedBalance)> {
        let mut entries: Vec<_> = self
            .read()
            .iter()
            .map(|(asset, balance)| (*asset, balance.clone()))
            .collect();
        entries.sort_by_key(|(asset, _)| *asset);
        entries
    }

    fn store(&self, asset: AssetId, balance: CachedBalance) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(asset, balance);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<AssetId, CachedBalance>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated(CachedBalance),
    /// A refresh for the same asset was already running; nothing was read.
    InFlight,
    Failed(GatewayError),
}

/// Result of one refresh cycle over a set of assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub updated: Vec<AssetId>,
    pub skipped: Vec<AssetId>,
    pub failed: Vec<(AssetId, GatewayError)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Could not refresh any balance ({} failed)", failures.len())]
    AllFailed { failures: Vec<(AssetId, GatewayError)> },
}

/// Releases an asset's in-flight slot on drop.
struct InFlightSlot<'a> {
    set: &'a Mutex<HashSet<AssetId>>,
    asset: AssetId,
}

impl<'a> InFlightSlot<'a> {
    fn try_acquire(set: &'a Mutex<HashSet<AssetId>>, asset: AssetId) -> Option<Self> {
        let inserted = set.lock().unwrap_or_else(|e| e.into_inner()).insert(asset);
        inserted.then(|| Self { set, asset })
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.asset);
    }
}

pub struct BalanceSynchronizer {
    gateway: Arc<dyn ChainGateway>,
    owner: Address,
    tokens: Vec<TokenConfig>,
    cache: BalanceCache,
    in_flight: Mutex<HashSet<AssetId>>,
}

impl BalanceSynchronizer {
    pub fn new(gateway: Arc<dyn ChainGateway>, owner: Address, tokens: Vec<TokenConfig>) -> Self {
        Self {
            gateway,
            owner,
            tokens,
            cache: BalanceCache::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    pub fn tokens(&self) -> &[TokenConfig] {
        &self.tokens
    }

    /// Display symbol for `asset`.
    pub fn symbol(&self, asset: &AssetId) -> &str {
        match asset {
            AssetId::Native => "BERA",
            AssetId::Token(address) => self
                .tokens
                .iter()
                .find(|t| t.address == *address)
                .map_or("?", |t| t.symbol.as_str()),
        }
    }

    /// Refresh one asset unless a refresh for it is already running.
    pub async fn refresh(&self, asset: AssetId) -> RefreshOutcome {
        let Some(_slot) = InFlightSlot::try_acquire(&self.in_flight, asset) else {
            debug!("refresh of {:?} already in flight, skipping", asset);
            return RefreshOutcome::InFlight;
        };

        let read = match asset {
            AssetId::Native => self
                .gateway
                .native_balance(self.owner)
                .await
                .map(|raw| (raw, NATIVE_DECIMALS)),
            AssetId::Token(contract) => self.read_token(contract).await,
        };

        match read {
            Ok((raw, decimals)) => {
                let balance = CachedBalance {
                    raw,
                    decimals,
                    refreshed_at: Utc::now(),
                };
                debug!("{} balance: {}", self.symbol(&asset), balance.value());
                self.cache.store(asset, balance.clone());
                RefreshOutcome::Updated(balance)
            }
            Err(e) => {
                debug!("refresh of {} failed: {}", self.symbol(&asset), e);
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Decimals are read on every refresh alongside the balance.
    async fn read_token(&self, contract: Address) -> Result<(U256, u8), GatewayError> {
        let balance_call = token::balance_of_calldata(self.owner);
        let decimals_call = token::decimals_calldata();
        let (balance, decimals) = futures::future::try_join(
            self.gateway.call(contract, &balance_call),
            self.gateway.call(contract, &decimals_call),
        )
        .await?;
        let raw = token::decode_uint256(&balance).map_err(GatewayError::Decode)?;
        let decimals = token::decode_uint8(&decimals).map_err(GatewayError::Decode)?;
        Ok((raw, decimals))
    }

    /// Refresh `assets` concurrently and summarize.
    ///
    /// Fails only when every asset that was actually read failed.
    pub async fn run_cycle(&self, assets: &[AssetId]) -> Result<CycleReport, SyncError> {
        let outcomes = join_all(assets.iter().map(|asset| self.refresh(*asset))).await;

        let mut report = CycleReport::default();
        for (asset, outcome) in assets.iter().zip(outcomes) {
            match outcome {
                RefreshOutcome::Updated(_) => report.updated.push(*asset),
                RefreshOutcome::InFlight => report.skipped.push(*asset),
                RefreshOutcome::Failed(e) => report.failed.push((*asset, e)),
            }
        }

        if !report.failed.is_empty() && report.updated.is_empty() && report.skipped.is_empty() {
            return Err(SyncError::AllFailed {
                failures: report.failed,
            });
        }
        Ok(report)
    }

    pub async fn refresh_native(&self) -> Result<CycleReport, SyncError> {
        self.run_cycle(&[AssetId::Native]).await
    }

    pub async fn refresh_tokens(&self) -> Result<CycleReport, SyncError> {
        let assets: Vec<AssetId> = self
            .tokens
            .iter()
            .map(|t| AssetId::Token(t.address))
            .collect();
        self.run_cycle(&assets).await
    }
}

/// Owns the two periodic refresh tasks. Dropping it stops them.
pub struct SyncScheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn the native and token cycles. `hints` triggers extra refreshes.
    pub fn start(
        sync: Arc<BalanceSynchronizer>,
        config: &SyncConfig,
        hints: UnboundedReceiver<RefreshHint>,
    ) -> Self {
        let native = tokio::spawn(Self::native_loop(
            sync.clone(),
            config.native_interval(),
            hints,
        ));
        let tokens = tokio::spawn(Self::token_loop(sync, config.token_interval()));
        debug!(
            "sync started: native every {:?}, tokens every {:?}",
            config.native_interval(),
            config.token_interval()
        );
        Self {
            tasks: vec![native, tokens],
        }
    }

    async fn native_loop(
        sync: Arc<BalanceSynchronizer>,
        period: Duration,
        mut hints: UnboundedReceiver<RefreshHint>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = JoinSet::new();
        let mut hints_open = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycles.spawn(Self::native_cycle(sync.clone()));
                }
                hint = hints.recv(), if hints_open => match hint {
                    Some(RefreshHint::Native) => {
                        cycles.spawn(Self::native_cycle(sync.clone()));
                    }
                    Some(RefreshHint::Tokens) => {
                        cycles.spawn(Self::token_cycle(sync.clone()));
                    }
                    None => hints_open = false,
                },
                Some(_) = cycles.join_next() => {}
            }
        }
    }

    async fn token_loop(sync: Arc<BalanceSynchronizer>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = JoinSet::new();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycles.spawn(Self::token_cycle(sync.clone()));
                }
                Some(_) = cycles.join_next() => {}
            }
        }
    }

    async fn native_cycle(sync: Arc<BalanceSynchronizer>) {
        if let Err(e) = sync.refresh_native().await {
            warn!("native balance refresh failed: {}", e);
        }
    }

    async fn token_cycle(sync: Arc<BalanceSynchronizer>) {
        if sync.tokens().is_empty() {
            return;
        }
        if let Err(e) = sync.refresh_tokens().await {
            warn!("token balance refresh failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Abort both loops and any cycle they started.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

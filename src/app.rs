//! Wallet session.
//!
//! Ties the account to the builder, submitter, balance synchronizer,
//! staking ledger and history for the lifetime of one run.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    config::Config,
    domain::{
        account::Account,
        history::TransactionHistory,
        staking::StakingLedger,
        tx::{TransactionRecord, TransactionRequest},
        tx_builder::{BuildError, TxBuilder},
    },
    infra::{
        gateway::{ChainGateway, GatewayError},
        submitter::{SubmissionError, TxSubmitter},
        sync::{AssetId, BalanceSynchronizer, CycleReport, SyncError, SyncScheduler},
    },
};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("A transaction is already being sent")]
    Busy,
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Submit(#[from] SubmissionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    pub expected: u64,
    pub reported: u64,
}

impl NetworkStatus {
    pub fn matches(&self) -> bool {
        self.expected == self.reported
    }
}

/// One displayable balance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceLine {
    pub asset: AssetId,
    pub symbol: String,
    pub value: String,
    pub refreshed_at: DateTime<Utc>,
}

/// Clears the sending flag on drop.
struct SendSlot<'a>(&'a AtomicBool);

impl Drop for SendSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session {
    config: Config,
    account: Account,
    gateway: Arc<dyn ChainGateway>,
    builder: TxBuilder,
    submitter: TxSubmitter,
    sync: Arc<BalanceSynchronizer>,
    scheduler: Option<SyncScheduler>,
    staking: StakingLedger,
    history: Mutex<TransactionHistory>,
    sending: AtomicBool,
}

impl Session {
    pub fn new(config: Config, account: Account, gateway: Arc<dyn ChainGateway>) -> Self {
        let builder = TxBuilder::new(
            gateway.clone(),
            config.network.chain_id,
            config.submit.gas_margin_percent,
        );
        let submitter = TxSubmitter::new(
            gateway.clone(),
            config.submit.receipt_timeout(),
            config.submit.receipt_poll_interval(),
        );
        let sync = Arc::new(BalanceSynchronizer::new(
            gateway.clone(),
            account.address(),
            config.tokens.clone(),
        ));
        let staking = StakingLedger::new(config.staking.clone());
        info!(
            "Session for {} on {} ({})",
            account.address(),
            config.network.name,
            config.network.rpc_url
        );
        Self {
            config,
            account,
            gateway,
            builder,
            submitter,
            sync,
            scheduler: None,
            staking,
            history: Mutex::new(TransactionHistory::new()),
            sending: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Compare the endpoint's network id with the configured one.
    ///
    /// A mismatch is logged and reported but does not block anything.
    pub async fn check_network(&self) -> Result<NetworkStatus, GatewayError> {
        let status = NetworkStatus {
            expected: self.config.network.expected_network_id,
            reported: self.gateway.network_id().await?,
        };
        if !status.matches() {
            warn!(
                "Connected to network {} but expected {}",
                status.reported, status.expected
            );
        }
        Ok(status)
    }

    /// Build and submit a native transfer.
    ///
    /// Only one send runs at a time. The history gains an entry only for a
    /// confirmed transfer; a timed-out submission is not recorded.
    pub async fn send(&self, recipient: &str, amount: &str) -> Result<TransactionRecord, SendError> {
        self.sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SendError::Busy)?;
        let _slot = SendSlot(&self.sending);

        let request = TransactionRequest::new(self.address(), recipient, amount);
        let tx = self.builder.build(&request).await?;
        let record = self.submitter.submit(&self.account, &tx).await?;
        self.history().push(record.clone());
        Ok(record)
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Start the periodic balance refresh. No-op if already running.
    pub fn start_sync(&mut self) {
        if self.scheduler.as_ref().is_some_and(SyncScheduler::is_running) {
            return;
        }
        let (hint_tx, hint_rx) = mpsc::unbounded_channel();
        self.submitter.set_refresh_hints(Some(hint_tx));
        self.scheduler = Some(SyncScheduler::start(
            self.sync.clone(),
            &self.config.sync,
            hint_rx,
        ));
    }

    pub fn stop_sync(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
            info!("Balance sync stopped");
        }
        self.submitter.set_refresh_hints(None);
    }

    pub fn is_syncing(&self) -> bool {
        self.scheduler.as_ref().is_some_and(SyncScheduler::is_running)
    }

    /// Run one native and one token cycle now.
    pub async fn refresh_balances(
        &self,
    ) -> (Result<CycleReport, SyncError>, Result<CycleReport, SyncError>) {
        tokio::join!(self.sync.refresh_native(), self.sync.refresh_tokens())
    }

    /// Cached balances, native first.
    pub fn balances(&self) -> Vec<BalanceLine> {
        self.sync
            .cache()
            .snapshot()
            .into_iter()
            .map(|(asset, balance)| BalanceLine {
                asset,
                symbol: self.sync.symbol(&asset).to_string(),
                value: balance.value(),
                refreshed_at: balance.refreshed_at,
            })
            .collect()
    }

    pub fn staking(&self) -> &StakingLedger {
        &self.staking
    }

    pub fn history(&self) -> MutexGuard<'_, TransactionHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

//! Staking ledger.
//!
//! Holds the account's single staking position. Stake, unbond and claim
//! each wait out a fixed processing latency before committing; only one of
//! them may be in flight at a time, and a failed operation leaves the
//! position untouched.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::StakingConfig,
    domain::amount::{parse_positive, Amount, ValidationError, NATIVE_DECIMALS},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] ValidationError),
    #[error("Another staking operation is in progress")]
    OperationInProgress,
    #[error("Cannot unbond {requested} BERA, only {staked} BERA staked")]
    InsufficientStaked { requested: Amount, staked: Amount },
    #[error("No rewards to claim")]
    NoRewards,
    #[error("Staking position not loaded")]
    NoPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingEntry {
    pub amount: Amount,
    pub completion_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPosition {
    pub staked_amount: Amount,
    pub rewards: Amount,
    /// Annual percentage rate, e.g. `12.5`.
    pub apr: Amount,
    pub total_claimed: Amount,
    /// Pending unbonds in request order.
    pub unbonding: Vec<UnbondingEntry>,
}

impl StakingPosition {
    pub fn unbonding_total(&self) -> Amount {
        self.unbonding
            .iter()
            .try_fold(Amount::ZERO, |acc, e| acc.checked_add(e.amount))
            .unwrap_or(Amount::ZERO)
    }
}

/// Clears the in-flight flag when the operation ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, StakingError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StakingError::OperationInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StakingLedger {
    config: StakingConfig,
    position: Mutex<Option<StakingPosition>>,
    busy: AtomicBool,
}

impl StakingLedger {
    pub fn new(config: StakingConfig) -> Self {
        Self {
            config,
            position: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<StakingPosition>> {
        // A poisoned lock still holds a consistent position: every commit is
        // a single assignment.
        self.position.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the position, seeding it from the configured snapshot on first use.
    pub fn fetch(&self) -> StakingPosition {
        let mut guard = self.lock();
        if let Some(position) = guard.as_ref() {
            return position.clone();
        }
        let now = Utc::now();
        let seed = &self.config.initial;
        let position = StakingPosition {
            staked_amount: seed.staked_amount,
            rewards: seed.rewards,
            apr: seed.apr,
            total_claimed: seed.total_claimed,
            unbonding: seed
                .unbonding
                .iter()
                .map(|u| UnbondingEntry {
                    amount: u.amount,
                    completion_time: now + to_chrono(Duration::from_secs(u.due_in_secs)),
                })
                .collect(),
        };
        debug!("staking position loaded: {} BERA staked", position.staked_amount);
        *guard = Some(position.clone());
        position
    }

    /// Read-only snapshot of the current position.
    pub fn position(&self) -> Option<StakingPosition> {
        self.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn stake(&self, amount: &str) -> Result<StakingPosition, StakingError> {
        let amount = Amount::from_wei(parse_positive(amount, NATIVE_DECIMALS)?);
        let _in_flight = InFlight::acquire(&self.busy)?;
        self.current()?;

        self.settle().await;
        let position = self.commit(|p| {
            p.staked_amount = p
                .staked_amount
                .checked_add(amount)
                .ok_or(StakingError::InvalidAmount(ValidationError::AmountOverflow))?;
            Ok(())
        })?;
        info!("Staked {} BERA", amount);
        Ok(position)
    }

    pub async fn unbond(&self, amount: &str) -> Result<StakingPosition, StakingError> {
        let amount = Amount::from_wei(parse_positive(amount, NATIVE_DECIMALS)?);
        let _in_flight = InFlight::acquire(&self.busy)?;
        Self::check_unbond(&self.current()?, amount)?;

        self.settle().await;
        let cooldown = to_chrono(self.config.cooldown());
        let position = self.commit(|p| {
            Self::check_unbond(p, amount)?;
            p.staked_amount = p.staked_amount.checked_sub(amount).unwrap_or(Amount::ZERO);
            p.unbonding.push(UnbondingEntry {
                amount,
                completion_time: Utc::now() + cooldown,
            });
            Ok(())
        })?;
        info!("Unbonding {} BERA", amount);
        Ok(position)
    }

    pub async fn claim_rewards(&self) -> Result<StakingPosition, StakingError> {
        let _in_flight = InFlight::acquire(&self.busy)?;
        if self.current()?.rewards.is_zero() {
            return Err(StakingError::NoRewards);
        }

        self.settle().await;
        let mut claimed = Amount::ZERO;
        let position = self.commit(|p| {
            if p.rewards.is_zero() {
                return Err(StakingError::NoRewards);
            }
            p.total_claimed = p
                .total_claimed
                .checked_add(p.rewards)
                .ok_or(StakingError::InvalidAmount(ValidationError::AmountOverflow))?;
            claimed = p.rewards;
            p.rewards = Amount::ZERO;
            Ok(())
        })?;
        info!("Claimed {} BERA in rewards", claimed);
        Ok(position)
    }

    /// Remove and return unbonding entries whose cooldown ended by `now`.
    pub fn sweep_matured(&self, now: DateTime<Utc>) -> Vec<UnbondingEntry> {
        let mut guard = self.lock();
        let Some(position) = guard.as_mut() else {
            return Vec::new();
        };
        let (matured, pending): (Vec<_>, Vec<_>) = position
            .unbonding
            .drain(..)
            .partition(|e| e.completion_time <= now);
        position.unbonding = pending;
        matured
    }

    fn current(&self) -> Result<StakingPosition, StakingError> {
        self.lock().clone().ok_or(StakingError::NoPosition)
    }

    fn check_unbond(position: &StakingPosition, amount: Amount) -> Result<(), StakingError> {
        if amount > position.staked_amount {
            return Err(StakingError::InsufficientStaked {
                requested: amount,
                staked: position.staked_amount,
            });
        }
        Ok(())
    }

    async fn settle(&self) {
        let latency = self.config.processing_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Apply `f` to a copy of the position and store it only if `f` succeeds.
    fn commit(
        &self,
        f: impl FnOnce(&mut StakingPosition) -> Result<(), StakingError>,
    ) -> Result<StakingPosition, StakingError> {
        let mut guard = self.lock();
        let mut next = guard.clone().ok_or(StakingError::NoPosition)?;
        f(&mut next)?;
        *guard = Some(next.clone());
        Ok(next)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

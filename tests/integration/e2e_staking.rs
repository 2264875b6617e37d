//! End-to-end staking flow through a session.

use std::{sync::Arc, time::Duration};

use bera_wallet::{
    config::StakingConfig,
    domain::{
        amount::Amount,
        staking::{StakingError, StakingLedger},
    },
};
use chrono::Utc;

use super::TestEnv;

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_stake_unbond_claim_cycle() {
    let env = TestEnv::new(1);
    let staking = env.session.staking();

    let initial = staking.fetch();
    assert_eq!(initial.staked_amount, amount("500"));
    assert_eq!(initial.unbonding.len(), 1);

    let after_stake = staking.stake("50").await.unwrap();
    assert_eq!(after_stake.staked_amount, amount("550"));

    let before_unbond = Utc::now();
    let after_unbond = staking.unbond("100").await.unwrap();
    assert_eq!(after_unbond.staked_amount, amount("450"));
    assert_eq!(after_unbond.unbonding.len(), 2);
    // Insertion order is kept: the seeded entry stays first.
    assert_eq!(after_unbond.unbonding[0], initial.unbonding[0]);
    let entry = &after_unbond.unbonding[1];
    assert_eq!(entry.amount, amount("100"));
    let due_in = entry.completion_time - before_unbond;
    assert!(due_in >= chrono::Duration::days(14));
    assert!(due_in < chrono::Duration::days(14) + chrono::Duration::seconds(5));

    let after_claim = staking.claim_rewards().await.unwrap();
    assert_eq!(after_claim.rewards.to_string(), "0");
    assert_eq!(after_claim.total_claimed.to_string(), "176.25");
    assert_eq!(staking.position(), Some(after_claim));
}

#[tokio::test]
async fn test_unbond_more_than_staked() {
    let env = TestEnv::new(1);
    let staking = env.session.staking();
    staking.fetch();

    let err = staking.unbond("500.5").await.unwrap_err();
    assert_eq!(
        err,
        StakingError::InsufficientStaked {
            requested: amount("500.5"),
            staked: amount("500"),
        }
    );
    assert_eq!(staking.position().unwrap().staked_amount, amount("500"));
    assert!(staking.unbond("500").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_operations_rejected() {
    let mut config = StakingConfig::default();
    config.processing_latency_ms = 5_000;
    let ledger = Arc::new(StakingLedger::new(config));
    ledger.fetch();

    let unbond = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.unbond("100").await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(ledger.stake("1").await, Err(StakingError::OperationInProgress));
    // Position is untouched while the unbond is still settling.
    assert_eq!(ledger.position().unwrap().staked_amount, amount("500"));

    let position = unbond.await.unwrap().unwrap();
    assert_eq!(position.staked_amount, amount("400"));
    assert!(ledger.stake("1").await.is_ok());
}

#[tokio::test]
async fn test_matured_unbonds_are_swept() {
    let env = TestEnv::new(1);
    let staking = env.session.staking();
    staking.fetch();

    assert!(staking.sweep_matured(Utc::now()).is_empty());
    let matured = staking.sweep_matured(Utc::now() + chrono::Duration::days(11));
    assert_eq!(matured.len(), 1);
    assert_eq!(matured[0].amount, amount("100"));
    assert!(staking.position().unwrap().unbonding.is_empty());
}

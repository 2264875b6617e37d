//! End-to-end balance synchronization.
//!
//! Runs the periodic cycles against the in-memory chain on a paused clock.

use std::time::Duration;

use alloy_primitives::U256;
use bera_wallet::infra::{memory::ChainOp, sync::AssetId};

use super::{units, TestEnv, RECIPIENT};

fn value_of(env: &TestEnv, asset: AssetId) -> Option<String> {
    env.session
        .balances()
        .into_iter()
        .find(|line| line.asset == asset)
        .map(|line| line.value)
}

#[tokio::test(start_paused = true)]
async fn test_cycles_populate_cache() {
    let mut env = TestEnv::new(3);
    env.session.start_sync();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let balances = env.session.balances();
    assert_eq!(balances.len(), 3);
    assert_eq!(balances[0].symbol, "BERA");
    assert_eq!(value_of(&env, AssetId::Native).as_deref(), Some("3"));
    assert_eq!(value_of(&env, AssetId::Token(env.honey)).as_deref(), Some("1000"));
    assert_eq!(value_of(&env, AssetId::Token(env.wbera)).as_deref(), Some("42.5"));
}

#[tokio::test(start_paused = true)]
async fn test_token_cycle_runs_more_often_than_native() {
    let mut env = TestEnv::new(3);
    env.session.start_sync();

    // Ticks at 0s, 10s, ... 60s for tokens; 0s, 30s, 60s for native.
    tokio::time::sleep(Duration::from_secs(60) + Duration::from_millis(10)).await;
    assert_eq!(env.chain.calls(ChainOp::NativeBalance), 3);
    // Two tokens, two calls each per cycle.
    assert_eq!(env.chain.calls(ChainOp::Call), 7 * 4);
}

#[tokio::test(start_paused = true)]
async fn test_slow_reads_do_not_pile_up() {
    let mut env = TestEnv::new(3);
    // Every read takes longer than the token period.
    env.chain.set_read_latency(Duration::from_secs(25));
    env.session.start_sync();

    tokio::time::sleep(Duration::from_secs(26)).await;
    // Only the first token cycle read anything; the 10s and 20s cycles
    // found every token still in flight.
    assert_eq!(env.chain.calls(ChainOp::Call), 4);
    assert_eq!(env.chain.calls(ChainOp::NativeBalance), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_token_keeps_last_value() {
    let mut env = TestEnv::new(3);
    env.session.start_sync();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let honey_before = env
        .session
        .balances()
        .into_iter()
        .find(|l| l.asset == AssetId::Token(env.honey))
        .unwrap();

    env.chain.fail_token(env.honey, true);
    env.chain
        .deploy_token(env.wbera, 6, env.owner(), U256::from(1_000_000u64));
    tokio::time::sleep(Duration::from_secs(10)).await;

    let honey_after = env
        .session
        .balances()
        .into_iter()
        .find(|l| l.asset == AssetId::Token(env.honey))
        .unwrap();
    assert_eq!(honey_after, honey_before);
    assert_eq!(value_of(&env, AssetId::Token(env.wbera)).as_deref(), Some("1"));
}

#[tokio::test(start_paused = true)]
async fn test_send_triggers_native_refresh() {
    let mut env = TestEnv::new(3);
    env.session.start_sync();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(value_of(&env, AssetId::Native).as_deref(), Some("3"));

    env.session.send(RECIPIENT, "1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refreshed well before the next 30s tick.
    let native = env.chain.balance_of(env.owner());
    assert!(native < units(2, 18));
    let shown = value_of(&env, AssetId::Native).unwrap();
    assert!(shown.starts_with("1.99"), "{shown}");
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_timers() {
    let mut env = TestEnv::new(3);
    env.session.start_sync();
    tokio::time::sleep(Duration::from_millis(10)).await;
    env.session.stop_sync();
    assert!(!env.session.is_syncing());

    let calls = env.chain.total_calls();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(env.chain.total_calls(), calls);

    // Restarting resumes polling.
    env.session.start_sync();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(env.chain.total_calls() > calls);
}

#[tokio::test]
async fn test_one_shot_refresh() {
    let env = TestEnv::new(7);
    let (native, tokens) = env.session.refresh_balances().await;
    assert_eq!(native.unwrap().updated, vec![AssetId::Native]);
    assert_eq!(tokens.unwrap().updated.len(), 2);
    assert_eq!(value_of(&env, AssetId::Native).as_deref(), Some("7"));
}

//! End-to-end send flow.
//!
//! Build, sign, broadcast and confirm native transfers through a session,
//! and check how each failure kind surfaces.

use alloy_primitives::U256;
use bera_wallet::{
    app::SendError,
    domain::{
        amount::{format_units, NATIVE_DECIMALS},
        tx::{TransactionRequest, TxType},
        tx_builder::{BuildError, TxBuilder},
    },
    infra::{
        gateway::GatewayError,
        memory::{ChainOp, ReceiptMode},
        submitter::SubmissionError,
    },
};

use super::{units, TestEnv, RECIPIENT};

#[tokio::test(start_paused = true)]
async fn test_send_moves_funds_and_records_history() {
    let env = TestEnv::new(10);

    let record = env.session.send(RECIPIENT, "2.5").await.unwrap();

    assert_eq!(record.tx_type, TxType::Sent);
    assert_eq!(record.counterparty, env.recipient());
    assert_eq!(record.amount.to_string(), "2.5");
    assert_eq!(
        env.chain.balance_of(env.recipient()),
        U256::from(2_500_000_000_000_000_000u128)
    );
    assert!(env.chain.balance_of(env.owner()) < units(10, 18) - units(2, 18));

    let history = env.session.history().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], record);
}

#[tokio::test(start_paused = true)]
async fn test_nonce_advances_only_after_broadcast() {
    let env = TestEnv::new(10);
    let builder = TxBuilder::new(std::sync::Arc::new(env.chain.clone()), 80069, 20);
    let request = TransactionRequest::new(env.owner(), RECIPIENT, "1");

    let first = builder.build(&request).await.unwrap();
    let second = builder.build(&request).await.unwrap();
    assert_eq!(first.nonce, second.nonce);

    env.session.send(RECIPIENT, "1").await.unwrap();

    let third = builder.build(&request).await.unwrap();
    assert!(third.nonce > second.nonce);
}

#[tokio::test(start_paused = true)]
async fn test_pending_nonce_used_for_back_to_back_sends() {
    let env = TestEnv::new(10);
    env.chain.set_receipt_mode(ReceiptMode::Never);

    // Neither is mined, but the second must not reuse the first's nonce.
    let first = env.session.send(RECIPIENT, "1").await.unwrap_err();
    let second = env.session.send(RECIPIENT, "1").await.unwrap_err();
    assert!(matches!(first, SendError::Submit(SubmissionError::Timeout { .. })));
    assert!(matches!(second, SendError::Submit(SubmissionError::Timeout { .. })));
    assert_eq!(env.chain.calls(ChainOp::Broadcast), 2);
    assert!(env.session.history().is_empty());
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_chain() {
    let env = TestEnv::new(10);

    for (to, amount) in [
        (RECIPIENT, "0"),
        (RECIPIENT, "-0.5"),
        (RECIPIENT, "ten"),
        ("0x1234", "1"),
        ("0x70997970c51812dc3a010c7d01b50e0d17dc79C8", "1"),
    ] {
        let err = env.session.send(to, amount).await.unwrap_err();
        assert!(
            matches!(err, SendError::Build(BuildError::Validation(_))),
            "{to} {amount}: {err:?}"
        );
    }
    assert_eq!(env.chain.total_calls(), 0);
}

#[tokio::test]
async fn test_insufficient_funds_reports_amounts() {
    let env = TestEnv::new(1);

    let err = env.session.send(RECIPIENT, "1.0").await.unwrap_err();
    let message = err.to_string();
    match err {
        SendError::Build(BuildError::InsufficientFunds {
            required,
            available,
        }) => {
            assert_eq!(format_units(available, NATIVE_DECIMALS), "1");
            assert!(required > available);
            assert!(message.contains(&format_units(required, NATIVE_DECIMALS)));
            assert!(message.contains("have 1 BERA"));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_eq!(env.chain.calls(ChainOp::Broadcast), 0);
}

#[tokio::test]
async fn test_estimation_failure_surfaces() {
    let env = TestEnv::new(10);
    env.chain.fail_estimation(true);

    let err = env.session.send(RECIPIENT, "1").await.unwrap_err();
    assert!(matches!(err, SendError::Build(BuildError::Estimation(_))));
    assert!(err.to_string().contains("smaller amount"));
}

#[tokio::test(start_paused = true)]
async fn test_reverted_transfer_not_recorded() {
    let env = TestEnv::new(10);
    env.chain.set_receipt_mode(ReceiptMode::Revert);

    let err = env.session.send(RECIPIENT, "1").await.unwrap_err();
    assert!(matches!(err, SendError::Submit(SubmissionError::Reverted { .. })));
    assert!(env.session.history().is_empty());
}

#[tokio::test]
async fn test_broadcast_rejections_are_classified() {
    let env = TestEnv::new(10);

    env.chain.reject_broadcasts(Some(GatewayError::Rpc {
        code: -32000,
        message: "replacement transaction underpriced".into(),
    }));
    let err = env.session.send(RECIPIENT, "1").await.unwrap_err();
    assert!(matches!(err, SendError::Submit(SubmissionError::NonceConflict { .. })));

    env.chain
        .reject_broadcasts(Some(GatewayError::Transport("connection reset".into())));
    let err = env.session.send(RECIPIENT, "1").await.unwrap_err();
    assert!(matches!(err, SendError::Submit(SubmissionError::Transport { .. })));
    assert!(!err.to_string().contains("connection reset"));

    assert!(!env.session.is_sending());
}

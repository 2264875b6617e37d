//! Transaction submitter.
//!
//! Signs a built transaction, broadcasts it, and waits (bounded) for its
//! receipt. Broadcast rejections are classified so callers never see raw
//! node error text.

use std::{sync::Arc, time::Duration};

use alloy_primitives::TxHash;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        account::Account,
        signer::sign_transaction,
        tx::{BuiltTransaction, TransactionRecord},
    },
    infra::{
        gateway::{ChainGateway, GatewayError, Receipt},
        sync::RefreshHint,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Could not sign the transaction")]
    SigningFailed { detail: String },
    #[error("Nonce already used by another transaction; refresh and try again")]
    NonceConflict { detail: String },
    #[error("This transaction was already submitted")]
    AlreadyKnown { detail: String },
    /// The transaction may still be mined; funds may have moved.
    #[error("Transaction {hash} not confirmed in time; it may still be mined")]
    Timeout { hash: TxHash },
    #[error("Transaction {hash} failed on chain")]
    Reverted { hash: TxHash },
    #[error("Network error while submitting the transaction")]
    Transport { detail: String },
}

impl SubmissionError {
    /// Underlying node or library message, for logs.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::SigningFailed { detail }
            | Self::NonceConflict { detail }
            | Self::AlreadyKnown { detail }
            | Self::Transport { detail } => Some(detail),
            Self::Timeout { .. } | Self::Reverted { .. } => None,
        }
    }
}

/// Map a broadcast rejection onto the submission taxonomy.
pub fn classify_rejection(err: GatewayError) -> SubmissionError {
    match &err {
        GatewayError::Rpc { message, .. } => {
            let lower = message.to_ascii_lowercase();
            if lower.contains("already known") || lower.contains("known transaction") {
                SubmissionError::AlreadyKnown {
                    detail: message.clone(),
                }
            } else if lower.contains("nonce too low")
                || lower.contains("replacement transaction underpriced")
                || lower.contains("nonce too high")
            {
                SubmissionError::NonceConflict {
                    detail: message.clone(),
                }
            } else {
                SubmissionError::Transport {
                    detail: err.to_string(),
                }
            }
        }
        GatewayError::Transport(_) | GatewayError::Decode(_) => SubmissionError::Transport {
            detail: err.to_string(),
        },
    }
}

pub struct TxSubmitter {
    gateway: Arc<dyn ChainGateway>,
    receipt_timeout: Duration,
    poll_interval: Duration,
    hints: Option<UnboundedSender<RefreshHint>>,
}

impl TxSubmitter {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        receipt_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            receipt_timeout,
            poll_interval,
            hints: None,
        }
    }

    /// Send a native-balance refresh hint after each confirmed transfer.
    pub fn set_refresh_hints(&mut self, hints: Option<UnboundedSender<RefreshHint>>) {
        self.hints = hints;
    }

    /// Sign, broadcast and wait for `tx` to be mined.
    ///
    /// Callers must not run two submissions for the same account at once.
    pub async fn submit(
        &self,
        account: &Account,
        tx: &BuiltTransaction,
    ) -> Result<TransactionRecord, SubmissionError> {
        let signed = sign_transaction(account, tx).map_err(|e| SubmissionError::SigningFailed {
            detail: e.to_string(),
        })?;

        let hash = self.gateway.broadcast(&signed.raw).await.map_err(|e| {
            let err = classify_rejection(e);
            warn!("broadcast rejected: {} ({:?})", err, err.detail());
            err
        })?;
        if hash != signed.hash {
            debug!("node reported hash {} for local hash {}", hash, signed.hash);
        }
        info!("Broadcast transaction {} (nonce {})", hash, tx.nonce);

        let receipt = tokio::time::timeout(self.receipt_timeout, self.wait_for_receipt(hash))
            .await
            .map_err(|_| {
                warn!(
                    "no receipt for {} after {:?}; it may still be mined",
                    hash, self.receipt_timeout
                );
                SubmissionError::Timeout { hash }
            })?;

        if !receipt.success {
            warn!("transaction {} reverted", hash);
            return Err(SubmissionError::Reverted { hash });
        }

        info!("Transaction {} confirmed", hash);
        if let Some(hints) = &self.hints {
            // The synchronizer may already be stopped.
            let _ = hints.send(RefreshHint::Native);
        }
        Ok(TransactionRecord::sent(tx, hash))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Receipt {
        loop {
            match self.gateway.receipt(hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => debug!("receipt poll for {} failed: {}", hash, e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

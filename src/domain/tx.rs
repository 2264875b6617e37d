use alloy_primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::amount::Amount;

/// A transfer as entered by the user, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub sender: Address,
    pub recipient: String,
    pub amount: String,
}

impl TransactionRequest {
    pub fn new(sender: Address, recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            sender,
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }
}

/// A fully parameterized, unsigned legacy transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltTransaction {
    pub sender: Address,
    pub recipient: Address,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub chain_id: u64,
}

impl BuiltTransaction {
    /// Upper bound on the fee: gas_limit * gas_price.
    pub fn max_fee(&self) -> U256 {
        self.gas_price.saturating_mul(U256::from(self.gas_limit))
    }

    /// Value plus maximum fee.
    pub fn total_cost(&self) -> U256 {
        self.value.saturating_add(self.max_fee())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TxType {
    Sent,
    Received,
}

/// One entry of the transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_type: TxType,
    pub amount: Amount,
    pub counterparty: Address,
    pub hash: Option<TxHash>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Record for a confirmed outgoing transfer.
    pub fn sent(tx: &BuiltTransaction, hash: TxHash) -> Self {
        Self {
            tx_type: TxType::Sent,
            amount: Amount::from_wei(tx.value),
            counterparty: tx.recipient,
            hash: Some(hash),
            timestamp: Utc::now(),
        }
    }

    pub fn received(amount: Amount, from: Address, hash: Option<TxHash>) -> Self {
        Self {
            tx_type: TxType::Received,
            amount,
            counterparty: from,
            hash,
            timestamp: Utc::now(),
        }
    }
}

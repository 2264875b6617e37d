//! Chain RPC gateway seam.
//!
//! Everything the wallet needs from a chain endpoint goes through
//! [`ChainGateway`]. Reads are idempotent; `broadcast` is not.

use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The request never got a well-formed answer.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Block tag for nonce lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    Latest,
    Pending,
}

/// Candidate transfer used for gas estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// Execution outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: TxHash,
    pub success: bool,
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Native balance in wei.
    async fn native_balance(&self, address: Address) -> Result<U256, GatewayError>;

    async fn gas_price(&self) -> Result<U256, GatewayError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, GatewayError>;

    /// Transaction count of `address` at `tag`.
    async fn nonce(&self, address: Address, tag: BlockTag) -> Result<u64, GatewayError>;

    /// Submit a signed raw transaction, returning its hash.
    async fn broadcast(&self, raw: &Bytes) -> Result<TxHash, GatewayError>;

    /// `None` until the transaction is mined.
    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, GatewayError>;

    async fn network_id(&self) -> Result<u64, GatewayError>;

    /// Read-only contract call against the latest block.
    async fn call(&self, contract: Address, data: &Bytes) -> Result<Bytes, GatewayError>;
}

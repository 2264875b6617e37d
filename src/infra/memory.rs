//! In-process chain used by tests and `--offline` runs.
//!
//! Keeps balances, token contracts and nonces in memory, decodes and
//! verifies broadcast transactions, and lets callers script failures and
//! latency. Every gateway call is counted per operation.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    domain::{signer::decode_signed, token},
    infra::gateway::{BlockTag, CallRequest, ChainGateway, GatewayError, Receipt},
};

/// Gas charged for a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainOp {
    NativeBalance,
    GasPrice,
    EstimateGas,
    Nonce,
    Broadcast,
    Receipt,
    NetworkId,
    Call,
}

/// How broadcast transactions resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    /// Mined successfully on the first receipt poll.
    Confirm,
    /// Mined with a failed execution status.
    Revert,
    /// Accepted into the pool but never mined.
    Never,
}

#[derive(Debug, Clone)]
struct TokenContract {
    decimals: u8,
    balances: HashMap<Address, U256>,
}

#[derive(Debug)]
struct ChainState {
    network_id: u64,
    chain_id: u64,
    gas_price: U256,
    gas_estimate: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    pending: HashMap<Address, u64>,
    tokens: HashMap<Address, TokenContract>,
    receipts: HashMap<TxHash, Receipt>,
    seen: HashSet<TxHash>,
    receipt_mode: ReceiptMode,
    fail_estimation: bool,
    fail_native_reads: bool,
    failing_tokens: HashSet<Address>,
    broadcast_rejection: Option<GatewayError>,
    read_latency: Duration,
    calls: HashMap<ChainOp, usize>,
}

#[derive(Clone)]
pub struct InMemoryChain {
    state: Arc<Mutex<ChainState>>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64) -> Self {
        let state = ChainState {
            network_id: chain_id,
            chain_id,
            gas_price: U256::from(20_000_000_000u64),
            gas_estimate: TRANSFER_GAS,
            balances: HashMap::new(),
            nonces: HashMap::new(),
            pending: HashMap::new(),
            tokens: HashMap::new(),
            receipts: HashMap::new(),
            seen: HashSet::new(),
            receipt_mode: ReceiptMode::Confirm,
            fail_estimation: false,
            fail_native_reads: false,
            failing_tokens: HashSet::new(),
            broadcast_rejection: None,
            read_latency: Duration::ZERO,
            calls: HashMap::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.with_state(|s| {
            s.balances.insert(address, wei);
        });
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.with_state(|s| s.balances.get(&address).copied().unwrap_or_default())
    }

    pub fn set_network_id(&self, network_id: u64) {
        self.with_state(|s| s.network_id = network_id);
    }

    pub fn set_gas_price(&self, wei: U256) {
        self.with_state(|s| s.gas_price = wei);
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.with_state(|s| s.gas_estimate = gas);
    }

    pub fn fail_estimation(&self, fail: bool) {
        self.with_state(|s| s.fail_estimation = fail);
    }

    pub fn fail_native_reads(&self, fail: bool) {
        self.with_state(|s| s.fail_native_reads = fail);
    }

    /// Deploy (or replace) a token contract with one holder balance.
    pub fn deploy_token(&self, contract: Address, decimals: u8, holder: Address, raw: U256) {
        self.with_state(|s| {
            let token = s.tokens.entry(contract).or_insert_with(|| TokenContract {
                decimals,
                balances: HashMap::new(),
            });
            token.decimals = decimals;
            token.balances.insert(holder, raw);
        });
    }

    pub fn fail_token(&self, contract: Address, fail: bool) {
        self.with_state(|s| {
            if fail {
                s.failing_tokens.insert(contract);
            } else {
                s.failing_tokens.remove(&contract);
            }
        });
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        self.with_state(|s| s.receipt_mode = mode);
    }

    /// Reject every broadcast with `error` until cleared.
    pub fn reject_broadcasts(&self, error: Option<GatewayError>) {
        self.with_state(|s| s.broadcast_rejection = error);
    }

    /// Delay applied to every gateway call.
    pub fn set_read_latency(&self, latency: Duration) {
        self.with_state(|s| s.read_latency = latency);
    }

    /// Number of calls made for `op`.
    pub fn calls(&self, op: ChainOp) -> usize {
        self.with_state(|s| s.calls.get(&op).copied().unwrap_or(0))
    }

    pub fn total_calls(&self) -> usize {
        self.with_state(|s| s.calls.values().sum())
    }

    /// Count the call and wait out the configured latency.
    async fn enter(&self, op: ChainOp) {
        let latency = self.with_state(|s| {
            *s.calls.entry(op).or_insert(0) += 1;
            s.read_latency
        });
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn accept(s: &mut ChainState, raw: &Bytes) -> Result<TxHash, GatewayError> {
        let tx = decode_signed(raw).map_err(|e| GatewayError::Rpc {
            code: -32602,
            message: format!("invalid transaction: {e}"),
        })?;

        if tx.chain_id != s.chain_id {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: "invalid chain id for signer".to_string(),
            });
        }
        if s.seen.contains(&tx.hash) {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: "already known".to_string(),
            });
        }
        let expected = s
            .pending
            .get(&tx.sender)
            .copied()
            .unwrap_or_else(|| s.nonces.get(&tx.sender).copied().unwrap_or(0));
        if tx.nonce < expected {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: format!("nonce too low: next nonce {expected}, tx nonce {}", tx.nonce),
            });
        }

        let max_cost = tx
            .value
            .saturating_add(tx.gas_price.saturating_mul(U256::from(tx.gas_limit)));
        let balance = s.balances.get(&tx.sender).copied().unwrap_or_default();
        if balance < max_cost {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }

        s.seen.insert(tx.hash);
        s.pending.insert(tx.sender, tx.nonce + 1);

        let fee = tx.gas_price.saturating_mul(U256::from(TRANSFER_GAS));
        match s.receipt_mode {
            ReceiptMode::Confirm => {
                s.balances
                    .insert(tx.sender, balance.saturating_sub(tx.value).saturating_sub(fee));
                *s.balances.entry(tx.recipient).or_default() += tx.value;
                s.nonces.insert(tx.sender, tx.nonce + 1);
                s.receipts.insert(
                    tx.hash,
                    Receipt {
                        hash: tx.hash,
                        success: true,
                    },
                );
            }
            ReceiptMode::Revert => {
                s.balances.insert(tx.sender, balance.saturating_sub(fee));
                s.nonces.insert(tx.sender, tx.nonce + 1);
                s.receipts.insert(
                    tx.hash,
                    Receipt {
                        hash: tx.hash,
                        success: false,
                    },
                );
            }
            ReceiptMode::Never => {}
        }
        debug!("in-memory chain accepted {} (nonce {})", tx.hash, tx.nonce);
        Ok(tx.hash)
    }
}

#[async_trait]
impl ChainGateway for InMemoryChain {
    async fn native_balance(&self, address: Address) -> Result<U256, GatewayError> {
        self.enter(ChainOp::NativeBalance).await;
        self.with_state(|s| {
            if s.fail_native_reads {
                return Err(GatewayError::Transport("connection reset".to_string()));
            }
            Ok(s.balances.get(&address).copied().unwrap_or_default())
        })
    }

    async fn gas_price(&self) -> Result<U256, GatewayError> {
        self.enter(ChainOp::GasPrice).await;
        Ok(self.with_state(|s| s.gas_price))
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, GatewayError> {
        self.enter(ChainOp::EstimateGas).await;
        self.with_state(|s| {
            if s.fail_estimation {
                return Err(GatewayError::Rpc {
                    code: -32000,
                    message: "gas required exceeds allowance".to_string(),
                });
            }
            let balance = s.balances.get(&request.from).copied().unwrap_or_default();
            if balance < request.value {
                return Err(GatewayError::Rpc {
                    code: -32000,
                    message: "insufficient funds for transfer".to_string(),
                });
            }
            Ok(s.gas_estimate)
        })
    }

    async fn nonce(&self, address: Address, tag: BlockTag) -> Result<u64, GatewayError> {
        self.enter(ChainOp::Nonce).await;
        Ok(self.with_state(|s| {
            let latest = s.nonces.get(&address).copied().unwrap_or(0);
            match tag {
                BlockTag::Latest => latest,
                BlockTag::Pending => s.pending.get(&address).copied().unwrap_or(latest),
            }
        }))
    }

    async fn broadcast(&self, raw: &Bytes) -> Result<TxHash, GatewayError> {
        self.enter(ChainOp::Broadcast).await;
        self.with_state(|s| {
            if let Some(err) = s.broadcast_rejection.clone() {
                return Err(err);
            }
            Self::accept(s, raw)
        })
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, GatewayError> {
        self.enter(ChainOp::Receipt).await;
        Ok(self.with_state(|s| s.receipts.get(&hash).copied()))
    }

    async fn network_id(&self) -> Result<u64, GatewayError> {
        self.enter(ChainOp::NetworkId).await;
        Ok(self.with_state(|s| s.network_id))
    }

    async fn call(&self, contract: Address, data: &Bytes) -> Result<Bytes, GatewayError> {
        self.enter(ChainOp::Call).await;
        self.with_state(|s| {
            if s.failing_tokens.contains(&contract) {
                return Err(GatewayError::Transport("upstream timed out".to_string()));
            }
            let reverted = || GatewayError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            };
            let token = s.tokens.get(&contract).ok_or_else(reverted)?;
            let (selector, args) = token::split_selector(data).ok_or_else(reverted)?;
            match selector {
                token::DECIMALS_SELECTOR => Ok(token::encode_word(U256::from(token.decimals))),
                token::BALANCE_OF_SELECTOR if args.len() == 32 => {
                    let owner = Address::from_slice(&args[12..]);
                    let raw = token.balances.get(&owner).copied().unwrap_or_default();
                    Ok(token::encode_word(raw))
                }
                _ => Err(reverted()),
            }
        })
    }
}

//! Transaction builder for native transfers.
//!
//! Turns a user-entered request into a fully parameterized legacy
//! transaction: validates the recipient and amount locally, then queries
//! gas price, gas estimate, pending nonce and balance from the chain.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    domain::{
        amount::{format_units, parse_positive, ValidationError, NATIVE_DECIMALS},
        tx::{BuiltTransaction, TransactionRequest},
    },
    infra::gateway::{BlockTag, CallRequest, ChainGateway, GatewayError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Gas price or gas estimation failed. Retrying with a smaller amount
    /// usually helps.
    #[error("Gas estimation failed; try a smaller amount")]
    Estimation(#[source] GatewayError),
    #[error(
        "Insufficient funds: need {} BERA, have {} BERA",
        format_units(*required, NATIVE_DECIMALS),
        format_units(*available, NATIVE_DECIMALS)
    )]
    InsufficientFunds { required: U256, available: U256 },
    /// Nonce or balance could not be read.
    #[error("Network unavailable: {0}")]
    Unavailable(#[source] GatewayError),
}

/// Parse a recipient as a 0x-prefixed 20-byte hex address.
///
/// All-lowercase and all-uppercase forms are accepted as is; mixed case
/// must carry a valid EIP-55 checksum.
pub fn parse_recipient(text: &str) -> Result<Address, ValidationError> {
    let s = text.trim();
    let invalid = || ValidationError::InvalidRecipient(s.to_string());

    let hex = s.strip_prefix("0x").ok_or_else(invalid)?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(s, None).map_err(|_| invalid())
    } else {
        s.parse::<Address>().map_err(|_| invalid())
    }
}

pub struct TxBuilder {
    gateway: Arc<dyn ChainGateway>,
    chain_id: u64,
    gas_margin_percent: u64,
}

impl TxBuilder {
    pub fn new(gateway: Arc<dyn ChainGateway>, chain_id: u64, gas_margin_percent: u64) -> Self {
        Self {
            gateway,
            chain_id,
            gas_margin_percent,
        }
    }

    /// Estimate plus the safety margin, rounded up.
    pub fn apply_margin(&self, estimate: u64) -> u64 {
        let scaled = u128::from(estimate) * u128::from(100 + self.gas_margin_percent);
        u64::try_from(scaled.div_ceil(100)).unwrap_or(u64::MAX)
    }

    /// Build an unsigned transfer for `request`.
    ///
    /// Validation failures return before any gateway call. The funds check
    /// uses the margined gas limit, so the returned transaction always
    /// satisfies `value + gas_limit * gas_price <= balance` at build time.
    pub async fn build(&self, request: &TransactionRequest) -> Result<BuiltTransaction, BuildError> {
        let recipient = parse_recipient(&request.recipient)?;
        let value = parse_positive(&request.amount, NATIVE_DECIMALS)?;

        let gas_price = self
            .gateway
            .gas_price()
            .await
            .map_err(BuildError::Estimation)?;
        let estimate = self
            .gateway
            .estimate_gas(&CallRequest {
                from: request.sender,
                to: recipient,
                value,
            })
            .await
            .map_err(BuildError::Estimation)?;

        let nonce = self
            .gateway
            .nonce(request.sender, BlockTag::Pending)
            .await
            .map_err(BuildError::Unavailable)?;

        let tx = BuiltTransaction {
            sender: request.sender,
            recipient,
            value,
            nonce,
            gas_limit: self.apply_margin(estimate),
            gas_price,
            chain_id: self.chain_id,
        };

        let available = self
            .gateway
            .native_balance(request.sender)
            .await
            .map_err(BuildError::Unavailable)?;
        let required = tx.total_cost();
        if available < required {
            return Err(BuildError::InsufficientFunds {
                required,
                available,
            });
        }

        debug!(
            "built tx nonce={} gas_limit={} (estimate {}) gas_price={}",
            tx.nonce, tx.gas_limit, estimate, tx.gas_price
        );
        info!(
            "Prepared transfer of {} BERA to {}",
            format_units(value, NATIVE_DECIMALS),
            recipient
        );
        Ok(tx)
    }
}

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy_primitives::{Address, Bytes, TxHash, U256, U64};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::infra::gateway::{BlockTag, CallRequest, ChainGateway, GatewayError, Receipt};

/// Per-request HTTP timeout. Receipt waiting has its own, longer bound.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    status: Option<U64>,
}

/// Ethereum JSON-RPC client over HTTP.
pub struct JsonRpcGateway {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    pub fn new(rpc_url: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Get the RPC URL.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Issue one JSON-RPC call. A `null` result is returned as `None`.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("rpc {} #{}", method, id);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "{method}: HTTP {status}"
            )));
        }

        let payload: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("{method}: {e}")))?;

        if let Some(err) = payload.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(payload.result)
    }

    async fn request_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, GatewayError> {
        self.request(method, params)
            .await?
            .ok_or_else(|| GatewayError::Decode(format!("{method}: missing result")))
    }
}

#[async_trait]
impl ChainGateway for JsonRpcGateway {
    async fn native_balance(&self, address: Address) -> Result<U256, GatewayError> {
        self.request_required("eth_getBalance", json!([address, BlockTag::Latest]))
            .await
    }

    async fn gas_price(&self) -> Result<U256, GatewayError> {
        self.request_required("eth_gasPrice", json!([])).await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, GatewayError> {
        let gas: U64 = self
            .request_required("eth_estimateGas", json!([request]))
            .await?;
        Ok(gas.to::<u64>())
    }

    async fn nonce(&self, address: Address, tag: BlockTag) -> Result<u64, GatewayError> {
        let count: U64 = self
            .request_required("eth_getTransactionCount", json!([address, tag]))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn broadcast(&self, raw: &Bytes) -> Result<TxHash, GatewayError> {
        self.request_required("eth_sendRawTransaction", json!([raw]))
            .await
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, GatewayError> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(receipt.map(|r| Receipt {
            hash: r.transaction_hash,
            // Pre-Byzantium receipts carry no status; treat presence as success.
            success: r.status.map_or(true, |s| s == U64::from(1)),
        }))
    }

    async fn network_id(&self) -> Result<u64, GatewayError> {
        let version: String = self.request_required("net_version", json!([])).await?;
        parse_network_id(&version)
    }

    async fn call(&self, contract: Address, data: &Bytes) -> Result<Bytes, GatewayError> {
        self.request_required(
            "eth_call",
            json!([{ "to": contract, "data": data }, BlockTag::Latest]),
        )
        .await
    }
}

/// `net_version` answers in decimal; some nodes answer in hex.
fn parse_network_id(version: &str) -> Result<u64, GatewayError> {
    let version = version.trim();
    let parsed = match version.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => version.parse(),
    };
    parsed.map_err(|_| GatewayError::Decode(format!("net_version: {version:?}")))
}

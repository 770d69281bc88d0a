//! EVM Client Module
//!
//! JSON-RPC client for EVM-compatible nodes. Implements [`ChainProvider`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{DeployError, Result};
use crate::gas::GasPrice;
use crate::provider::{CallRequest, ChainProvider, Log, NodeTransaction, Receipt};

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    #[serde(default)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
}

/// Transaction receipt as returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, Deserialize)]
struct RpcReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: B256,
    /// "0x1" on success, "0x0" on revert
    status: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    #[serde(rename = "gasUsed")]
    gas_used: String,
    #[serde(rename = "contractAddress")]
    contract_address: Option<Address>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcBlock {
    #[serde(rename = "baseFeePerGas")]
    base_fee_per_gas: Option<String>,
}

// ============================================================================
// HEX QUANTITIES
// ============================================================================

fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

fn hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a hex quantity such as `"0x1a"`.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| DeployError::InvalidInput(format!("invalid quantity '{}': {}", value, e)))
}

/// Parses a 256-bit hex quantity.
pub fn parse_u256(value: &str) -> Result<U256> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| DeployError::InvalidInput(format!("invalid quantity '{}': {}", value, e)))
}

fn call_object(request: &CallRequest) -> Value {
    let mut object = serde_json::Map::new();
    if let Some(from) = &request.from {
        object.insert("from".to_string(), json!(hex_address(from)));
    }
    if let Some(to) = &request.to {
        object.insert("to".to_string(), json!(hex_address(to)));
    }
    object.insert("data".to_string(), json!(hex_bytes(&request.data)));
    if request.value != U256::ZERO {
        object.insert("value".to_string(), json!(format!("0x{:x}", request.value)));
    }
    if let Some(gas) = request.gas {
        object.insert("gas".to_string(), json!(format!("0x{:x}", gas)));
    }
    if let Some(gas_price) = request.gas_price {
        object.insert("gasPrice".to_string(), json!(format!("0x{:x}", gas_price)));
    }
    Value::Object(object)
}

fn transaction_object(tx: &NodeTransaction) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("from".to_string(), json!(hex_address(&tx.from)));
    if let Some(to) = &tx.to {
        object.insert("to".to_string(), json!(hex_address(to)));
    }
    object.insert("data".to_string(), json!(hex_bytes(&tx.data)));
    object.insert("value".to_string(), json!(format!("0x{:x}", tx.value)));
    if let Some(gas) = tx.gas_limit {
        object.insert("gas".to_string(), json!(format!("0x{:x}", gas)));
    }
    if let Some(nonce) = tx.nonce {
        object.insert("nonce".to_string(), json!(format!("0x{:x}", nonce)));
    }
    match tx.price {
        Some(GasPrice::Legacy { gas_price }) => {
            object.insert("type".to_string(), json!("0x0"));
            object.insert("gasPrice".to_string(), json!(format!("0x{:x}", gas_price)));
        }
        Some(GasPrice::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }) => {
            object.insert("type".to_string(), json!("0x2"));
            object.insert("maxFeePerGas".to_string(), json!(format!("0x{:x}", max_fee_per_gas)));
            object.insert(
                "maxPriorityFeePerGas".to_string(),
                json!(format!("0x{:x}", max_priority_fee_per_gas)),
            );
        }
        None => {}
    }
    Value::Object(object)
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible blockchain nodes via JSON-RPC
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    base_url: String,
    next_id: AtomicU64,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `node_url` - Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create client
    pub fn new(node_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: node_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Sends one JSON-RPC request. A `null` result is returned as `None`.
    async fn request_opt<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!("{} -> {}", method, self.base_url);

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeployError::Transport {
                url: self.base_url.clone(),
                reason: format!("Failed to send {} request: {}", method, e),
            })?
            .json()
            .await
            .map_err(|e| DeployError::Transport {
                url: self.base_url.clone(),
                reason: format!("Failed to parse {} response: {}", method, e),
            })?;

        if let Some(error) = response.error {
            return Err(DeployError::Rpc {
                url: self.base_url.clone(),
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        self.request_opt(method, params)
            .await?
            .ok_or_else(|| DeployError::Transport {
                url: self.base_url.clone(),
                reason: format!("{} returned no result", method),
            })
    }
}

#[async_trait]
impl ChainProvider for EvmClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn chain_id(&self) -> Result<u64> {
        let id: String = self.request("eth_chainId", vec![]).await?;
        parse_quantity(&id)
    }

    async fn block_number(&self) -> Result<u64> {
        let number: String = self.request("eth_blockNumber", vec![]).await?;
        parse_quantity(&number)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.request("eth_getCode", vec![json!(hex_address(&address)), json!("latest")])
            .await
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        self.request("eth_call", vec![call_object(request), json!("latest")])
            .await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let gas: String = self
            .request("eth_estimateGas", vec![call_object(request)])
            .await?;
        parse_quantity(&gas)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        let count: String = self
            .request(
                "eth_getTransactionCount",
                vec![json!(hex_address(&address)), json!("pending")],
            )
            .await?;
        parse_quantity(&count)
    }

    async fn gas_price(&self) -> Result<U256> {
        let price: String = self.request("eth_gasPrice", vec![]).await?;
        parse_u256(&price)
    }

    async fn base_fee_per_gas(&self) -> Result<Option<U256>> {
        let block: Option<RpcBlock> = self
            .request_opt("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
            .await?;
        match block.and_then(|b| b.base_fee_per_gas) {
            Some(fee) => Ok(Some(parse_u256(&fee)?)),
            None => Ok(None),
        }
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256> {
        self.request("eth_sendRawTransaction", vec![json!(hex_bytes(raw))])
            .await
    }

    async fn send_transaction(&self, tx: &NodeTransaction) -> Result<B256> {
        self.request("eth_sendTransaction", vec![transaction_object(tx)])
            .await
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let receipt: Option<RpcReceipt> = self
            .request_opt("eth_getTransactionReceipt", vec![json!(hex_bytes(hash.as_slice()))])
            .await?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };

        Ok(Some(Receipt {
            transaction_hash: receipt.transaction_hash,
            status: receipt.status.as_deref().map(|s| s == "0x1").unwrap_or(true),
            block_number: receipt
                .block_number
                .as_deref()
                .map(parse_quantity)
                .transpose()?,
            gas_used: parse_quantity(&receipt.gas_used)?,
            contract_address: receipt.contract_address,
            logs: receipt
                .logs
                .into_iter()
                .map(|l| Log {
                    address: l.address,
                    topics: l.topics,
                    data: l.data,
                })
                .collect(),
        }))
    }
}

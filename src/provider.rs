//! Chain access used by every component.
//!
//! [`ChainProvider`] is the narrow set of node calls the deploy flows need.
//! [`crate::evm_client::EvmClient`] implements it over JSON-RPC.

use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{DeployError, Result};
use crate::gas::GasPrice;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// Read-only call or gas estimation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
}

impl CallRequest {
    pub fn to(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }
}

/// Transaction signed by the node (`eth_sendTransaction`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTransaction {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub nonce: Option<u64>,
    pub price: Option<GasPrice>,
}

/// Event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    /// `true` on success
    pub status: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Decodes every log matching event `E`, skipping the rest.
    pub fn decode_logs<E: alloy_sol_types::SolEvent>(&self) -> Vec<E> {
        self.logs
            .iter()
            .filter(|l| l.topics.first() == Some(&E::SIGNATURE_HASH))
            .filter_map(|l| E::decode_raw_log(l.topics.iter().copied(), &l.data, true).ok())
            .collect()
    }
}

/// How long to wait for a transaction to be mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: 300,
        }
    }
}

impl From<&crate::config::GasConfig> for ReceiptPolling {
    fn from(config: &crate::config::GasConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.receipt_poll_interval_ms),
            max_attempts: config.receipt_max_attempts,
        }
    }
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Endpoint description for log and error messages.
    fn endpoint(&self) -> &str;

    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    async fn get_code(&self, address: Address) -> Result<Bytes>;

    async fn call(&self, request: &CallRequest) -> Result<Bytes>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64>;

    /// Pending transaction count of `address`.
    async fn get_transaction_count(&self, address: Address) -> Result<u64>;

    async fn gas_price(&self) -> Result<U256>;

    /// `baseFeePerGas` of the latest block; `None` before London.
    async fn base_fee_per_gas(&self) -> Result<Option<U256>>;

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256>;

    async fn send_transaction(&self, tx: &NodeTransaction) -> Result<B256>;

    async fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>>;
}

// ============================================================================
// HELPERS
// ============================================================================

/// True when `address` holds code.
pub async fn is_deployed(provider: &dyn ChainProvider, address: Address) -> Result<bool> {
    if address == Address::ZERO {
        return Ok(false);
    }
    Ok(!provider.get_code(address).await?.is_empty())
}

/// Fails when the node behind `provider` is not on `expected_chain_id`.
pub async fn verify_chain_id(provider: &dyn ChainProvider, expected_chain_id: u64) -> Result<()> {
    let actual = provider.chain_id().await?;
    if actual != expected_chain_id {
        return Err(DeployError::InvalidInput(format!(
            "{} reports chain id {} but the network is configured with {}",
            provider.endpoint(),
            actual,
            expected_chain_id
        )));
    }
    Ok(())
}

/// Calls a view function and decodes its return value.
pub async fn call_view<C: SolCall + Send + Sync>(
    provider: &dyn ChainProvider,
    to: Address,
    call: &C,
) -> Result<C::Return> {
    let output = provider.call(&CallRequest::to(to, call.abi_encode())).await?;
    Ok(C::abi_decode_returns(&output, true)?)
}

/// Polls for a receipt until it is available or `max_attempts` polls have
/// passed. A reverted transaction is an error.
pub async fn wait_for_receipt(
    provider: &dyn ChainProvider,
    hash: B256,
    polling: ReceiptPolling,
) -> Result<Receipt> {
    for attempt in 0..polling.max_attempts.max(1) {
        if let Some(receipt) = provider.get_receipt(hash).await? {
            if !receipt.status {
                return Err(DeployError::Reverted(hash));
            }
            return Ok(receipt);
        }
        debug!("Receipt for {} not available yet (attempt {})", hash, attempt + 1);
        tokio::time::sleep(polling.interval).await;
    }
    Err(anyhow::anyhow!(
        "Timed out waiting for receipt of {} on {}",
        hash,
        provider.endpoint()
    )
    .into())
}

/// Sends a node-signed transaction from an unlocked account and waits for
/// it to be mined.
pub async fn send_and_wait(
    provider: &dyn ChainProvider,
    tx: &NodeTransaction,
    polling: ReceiptPolling,
) -> Result<Receipt> {
    let hash = provider.send_transaction(tx).await?;
    debug!("Sent transaction {} from {}", hash, tx.from);
    wait_for_receipt(provider, hash, polling).await
}

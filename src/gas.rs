//! Gas & Fee Estimator
//!
//! Transaction pricing, gas limits, the per-network messaging gas table and
//! the two-pass estimate of what a relayed message costs on the destination.

use std::time::Duration;

use alloy_primitives::{uint, Address, Bytes, U256};
use tracing::{debug, info, warn};

use crate::abi::LzGasParameters;
use crate::config::{EnvFlags, GasConfig, NetworkConfig};
use crate::contracts::{DestinationOperator, SourceBridge};
use crate::error::{DeployError, Result};
use crate::provider::{CallRequest, ChainProvider};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const MSG_BASE_GAS: u64 = 110_000;
pub const MSG_GAS_PER_BYTE: u64 = 25;
pub const JOB_BASE_GAS: u64 = 160_000;
pub const JOB_GAS_PER_BYTE: u64 = 35;
pub const MIN_GAS_PRICE_WEI: u64 = 1;
pub const GAS_LIMIT: u64 = 10_000_001;

/// Gas ceiling used when statically estimating a job.
pub const TEST_GAS_LIMIT: u64 = 10_000_000;

/// 1 gwei in wei.
pub const GWEI: U256 = uint!(1_000_000_000_U256);

/// Placeholder used for gas values when building the first payload.
pub const SENTINEL: U256 = U256::MAX;

/// Basis points denominator for multipliers.
const MULTIPLIER_BASE: u128 = 10_000;

// ============================================================================
// GAS PRICE
// ============================================================================

/// Pricing of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPrice {
    /// Type 0
    Legacy { gas_price: U256 },
    /// Type 2
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl GasPrice {
    pub fn tx_type(&self) -> u8 {
        match self {
            GasPrice::Legacy { .. } => 0,
            GasPrice::Eip1559 { .. } => 2,
        }
    }

    /// The most this transaction pays per unit of gas.
    pub fn max_price(&self) -> U256 {
        match self {
            GasPrice::Legacy { gas_price } => *gas_price,
            GasPrice::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }
}

fn apply_multiplier(value: U256, multiplier: u64) -> U256 {
    value * U256::from(multiplier) / U256::from(MULTIPLIER_BASE)
}

/// Prices a transaction on `provider`.
///
/// `GAS_PRICE_OVERRIDE` wins and always yields a legacy price. Otherwise the
/// node price is scaled by the configured multiplier; nodes that report a
/// base fee get an EIP-1559 price with both caps set to that value. With a
/// `max_gas_price_gwei` configured, pricing waits for a new block while the
/// price is above it.
pub async fn get_gas_price(
    provider: &dyn ChainProvider,
    flags: &EnvFlags,
    config: &GasConfig,
) -> Result<GasPrice> {
    if let Some(gas_price) = flags.gas_price_override {
        debug!("Using GAS_PRICE_OVERRIDE of {} wei", gas_price);
        return Ok(GasPrice::Legacy { gas_price });
    }

    let ceiling = config.max_gas_price_gwei.map(|g| U256::from(g) * GWEI);
    let mut attempts = 0u32;
    loop {
        let price = apply_multiplier(provider.gas_price().await?, config.gas_price_multiplier);

        match ceiling {
            Some(max) if price > max => {
                attempts += 1;
                if attempts >= config.receipt_max_attempts.max(1) {
                    return Err(DeployError::GasEstimation(format!(
                        "gas price {} wei stays above the configured maximum of {} wei",
                        price, max
                    )));
                }
                warn!("Gas price {} wei is above maximum {} wei, waiting for next block", price, max);
                wait_for_next_block(provider, Duration::from_millis(config.receipt_poll_interval_ms))
                    .await?;
            }
            _ => {
                return Ok(match provider.base_fee_per_gas().await? {
                    Some(_) => GasPrice::Eip1559 {
                        max_fee_per_gas: price,
                        max_priority_fee_per_gas: price,
                    },
                    None => GasPrice::Legacy { gas_price: price },
                })
            }
        }
    }
}

async fn wait_for_next_block(provider: &dyn ChainProvider, poll: Duration) -> Result<()> {
    let start = provider.block_number().await?;
    loop {
        tokio::time::sleep(poll).await;
        if provider.block_number().await? > start {
            return Ok(());
        }
    }
}

// ============================================================================
// GAS LIMIT
// ============================================================================

/// Estimates the gas limit of a call, scaled by `multiplier` (basis points).
///
/// With `skip_error`, node failures produce a limit of `0` which the caller
/// must treat as "unknown".
pub async fn get_gas_limit(
    provider: &dyn ChainProvider,
    from: Address,
    to: Option<Address>,
    data: &Bytes,
    value: U256,
    skip_error: bool,
    multiplier: u64,
) -> Result<u64> {
    let request = CallRequest {
        from: Some(from),
        to,
        data: data.clone(),
        value,
        ..Default::default()
    };

    let gas = match provider.estimate_gas(&request).await {
        Ok(gas) => gas,
        Err(e) if skip_error && e.is_rpc() => {
            warn!("Gas estimation failed, continuing with zero gas limit: {}", e);
            0
        }
        Err(e) => return Err(DeployError::GasEstimation(e.to_string())),
    };

    let scaled = u128::from(gas) * u128::from(multiplier) / MULTIPLIER_BASE;
    Ok(u64::try_from(scaled).unwrap_or(u64::MAX))
}

// ============================================================================
// MESSAGING GAS PARAMETERS
// ============================================================================

/// Messaging gas parameters for one destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParameters {
    pub msg_base_gas: U256,
    pub msg_gas_per_byte: U256,
    pub job_base_gas: U256,
    pub job_gas_per_byte: U256,
    pub min_gas_price: U256,
    pub max_gas_limit: U256,
}

impl Default for GasParameters {
    fn default() -> Self {
        Self {
            msg_base_gas: U256::from(MSG_BASE_GAS),
            msg_gas_per_byte: U256::from(MSG_GAS_PER_BYTE),
            job_base_gas: U256::from(JOB_BASE_GAS),
            job_gas_per_byte: U256::from(JOB_GAS_PER_BYTE),
            min_gas_price: U256::from(MIN_GAS_PRICE_WEI),
            max_gas_limit: U256::from(GAS_LIMIT),
        }
    }
}

impl From<LzGasParameters> for GasParameters {
    fn from(p: LzGasParameters) -> Self {
        Self {
            msg_base_gas: p.msgBaseGas,
            msg_gas_per_byte: p.msgGasPerByte,
            job_base_gas: p.jobBaseGas,
            job_gas_per_byte: p.jobGasPerByte,
            min_gas_price: p.minGasPrice,
            max_gas_limit: p.maxGasLimit,
        }
    }
}

impl From<GasParameters> for LzGasParameters {
    fn from(p: GasParameters) -> Self {
        Self {
            msgBaseGas: p.msg_base_gas,
            msgGasPerByte: p.msg_gas_per_byte,
            jobBaseGas: p.job_base_gas,
            jobGasPerByte: p.job_gas_per_byte,
            minGasPrice: p.min_gas_price,
            maxGasLimit: p.max_gas_limit,
        }
    }
}

impl GasParameters {
    /// The six values in on-chain order.
    pub fn as_array(&self) -> [U256; 6] {
        [
            self.msg_base_gas,
            self.msg_gas_per_byte,
            self.job_base_gas,
            self.job_gas_per_byte,
            self.min_gas_price,
            self.max_gas_limit,
        ]
    }
}

fn gwei_fraction(numerator: u64, denominator: u64) -> U256 {
    GWEI * U256::from(numerator) / U256::from(denominator)
}

/// Desired messaging gas parameters for a network key. Unlisted networks get
/// the defaults.
pub fn network_gas_parameters(network_key: &str) -> GasParameters {
    let mut params = GasParameters::default();
    match network_key {
        "ethereum" => params.min_gas_price = gwei_fraction(40, 1),
        "ethereumTestnetSepolia" => params.min_gas_price = gwei_fraction(1, 1),
        "avalanche" => params.min_gas_price = gwei_fraction(30, 1),
        "avalancheTestnet" => params.min_gas_price = gwei_fraction(1, 1),
        "polygon" => params.min_gas_price = gwei_fraction(200, 1),
        "polygonTestnet" => params.min_gas_price = gwei_fraction(5, 1),
        "binanceSmartChain" | "binanceSmartChainTestnet" => {
            params.job_base_gas = U256::from(180_000u64);
            params.job_gas_per_byte = U256::from(40u64);
            params.min_gas_price = gwei_fraction(1, 10);
        }
        "optimism" | "optimismTestnetSepolia" | "mantle" | "mantleTestnet" | "base"
        | "baseTestnet" | "zora" | "zoraTestnet" => {
            params.min_gas_price = gwei_fraction(1, 1000);
        }
        "arbitrumOne" | "arbitrumTestnetSepolia" => params.min_gas_price = gwei_fraction(1, 10),
        _ => {}
    }
    params
}

/// Live parameters read for one network.
#[derive(Debug, Clone)]
pub struct ObservedGasParameters<'a> {
    pub network: &'a NetworkConfig,
    pub live: GasParameters,
}

/// One bulk `setGasParameters` update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasParameterUpdate {
    pub chain_ids: Vec<u32>,
    pub parameters: Vec<GasParameters>,
}

impl GasParameterUpdate {
    pub fn is_empty(&self) -> bool {
        self.chain_ids.is_empty()
    }
}

/// Compares live values with the desired table and collects every mismatch.
///
/// A mismatch on the current network is also recorded under chain id `0`,
/// which the messaging module uses for "this chain".
pub fn plan_gas_parameter_updates(
    current: &NetworkConfig,
    observed: &[ObservedGasParameters<'_>],
) -> GasParameterUpdate {
    let mut update = GasParameterUpdate::default();
    for entry in observed {
        let desired = network_gas_parameters(&entry.network.key);
        if entry.live == desired {
            debug!("Gas parameters for {} are up to date", entry.network.key);
            continue;
        }
        info!("Gas parameters for {} need to be updated", entry.network.key);
        update.chain_ids.push(entry.network.holograph_id);
        update.parameters.push(desired);
        if entry.network.key == current.key {
            update.chain_ids.push(0);
            update.parameters.push(desired);
        }
    }
    update
}

// ============================================================================
// PAYLOAD GAS
// ============================================================================

/// Byte length of a hex payload: half the digit count (without `0x`),
/// rounded down.
pub fn payload_byte_length(payload_hex: &str) -> u64 {
    let digits = payload_hex.strip_prefix("0x").unwrap_or(payload_hex);
    (digits.len() / 2) as u64
}

/// Base and per-byte cost of executing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobGasModel {
    pub base_gas: u64,
    pub gas_per_byte: u64,
}

impl JobGasModel {
    /// Rough cost used when checking a job directly.
    pub const STANDARD: JobGasModel = JobGasModel {
        base_gas: 150_000,
        gas_per_byte: 30,
    };

    /// Cost used when bridging a token end to end.
    pub const BRIDGE: JobGasModel = JobGasModel {
        base_gas: 150_000,
        gas_per_byte: 35,
    };
}

/// `baseGas + floor(hexLength / 2) * gasPerByte`
pub fn execute_job_gas(payload_hex: &str, model: JobGasModel) -> U256 {
    U256::from(payload_byte_length(payload_hex) * model.gas_per_byte + model.base_gas)
}

/// Gas the messaging layer needs to deliver `payload`.
pub fn lz_message_gas(params: &GasParameters, payload: &Bytes) -> U256 {
    params.msg_base_gas + U256::from(payload.len()) * params.msg_gas_per_byte
}

/// Job gas plus the destination's job overhead for `payload`.
pub fn job_message_gas(gas: U256, params: &GasParameters, payload: &Bytes) -> U256 {
    gas + params.job_base_gas + U256::from(payload.len()) * params.job_gas_per_byte
}

// ============================================================================
// CROSS-CHAIN ESTIMATE
// ============================================================================

/// Result of [`estimate_cross_chain_execution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossChainEstimate {
    /// Final bridge-out payload, built with the refined gas values
    pub payload: Bytes,
    /// Gas to give the destination job, including job overhead
    pub estimated_gas: U256,
    /// `protocol_fee + messaging_fee`
    pub fee: U256,
    pub protocol_fee: U256,
    pub messaging_fee: U256,
    pub dest_gas_price: U256,
}

/// Estimates gas and fees for executing `raw_payload` on the destination.
///
/// The payload encodes its own gas limit, so the estimate is refined in
/// exactly two passes instead of iterated to convergence: very large payloads
/// can still come out slightly under.
pub async fn estimate_cross_chain_execution(
    source_bridge: &dyn SourceBridge,
    dest_operator: &dyn DestinationOperator,
    destination_chain: u32,
    target_contract: Address,
    raw_payload: &Bytes,
    dest_gas: &GasParameters,
) -> Result<CrossChainEstimate> {
    // First pass: placeholder gas values
    let draft = source_bridge
        .bridge_out_request_payload(destination_chain, target_contract, SENTINEL, SENTINEL, raw_payload)
        .await?;
    let remaining = dest_operator
        .job_estimator(&draft, U256::ZERO, GWEI, TEST_GAS_LIMIT)
        .await?;
    let estimated = U256::from(TEST_GAS_LIMIT).saturating_sub(remaining);
    debug!("First pass job gas estimate: {}", estimated);

    // Second pass: payload carries the estimate
    let payload = source_bridge
        .bridge_out_request_payload(destination_chain, target_contract, estimated, GWEI, raw_payload)
        .await?;
    let fees = source_bridge
        .message_fee(destination_chain, estimated, GWEI, &payload)
        .await?;
    let fee = fees.total();

    let remaining = dest_operator
        .job_estimator(&payload, fee, GWEI, TEST_GAS_LIMIT)
        .await?;
    let estimated = U256::from(TEST_GAS_LIMIT).saturating_sub(remaining);
    let estimated_gas = job_message_gas(estimated, dest_gas, &payload);

    info!(
        "Estimated {} gas and {} wei in fees for {} byte payload to chain {}",
        estimated_gas,
        fee,
        payload.len(),
        destination_chain
    );

    Ok(CrossChainEstimate {
        payload,
        estimated_gas,
        fee,
        protocol_fee: fees.protocol_fee,
        messaging_fee: fees.messaging_fee,
        dest_gas_price: fees.dest_gas_price,
    })
}

//! Cross-Chain Relay Simulator
//!
//! Drives a bridge-out on the source chain, delivers the resulting payload to
//! the destination operator through a mock messaging endpoint, and executes
//! the job. A job that runs out of gas is left pending on the destination and
//! can be completed later with [`recover`].

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::abi::{IHolographInterfaces, IHolographOperator, ILayerZeroModule, IMockLZEndpoint};
use crate::contracts::{DestinationOperator, JobDetails, MessageEndpoint, SourceBridge};
use crate::crypto::keccak256;
use crate::error::{DeployError, Result};
use crate::gas::{
    estimate_cross_chain_execution, lz_message_gas, CrossChainEstimate, GasParameters, GWEI,
};
use crate::provider::{call_view, ChainProvider, Receipt};

/// How the endpoint hands the payload to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// `crossChainMessage(operator, gas, payload)` with the endpoint standing
    /// in as the operator's messaging module for the call
    CrossChainMessage,
    /// `adminCall(target, lzReceive(srcChainId, srcSender, 0, payload))`, posing
    /// as the source chain's messaging module
    LzReceive {
        target: Address,
        source_lz_chain_id: u16,
        source_sender: Address,
    },
}

/// Holograph chain type in `HolographInterfaces.getChainId`.
const CHAIN_TYPE_HOLOGRAPH: u8 = 2;
/// LayerZero chain type in `HolographInterfaces.getChainId`.
const CHAIN_TYPE_LAYER_ZERO: u8 = 3;

/// LayerZero chain id of `holograph_id`, as the source chain's interfaces
/// contract maps it.
pub async fn layer_zero_chain_id(
    provider: &dyn ChainProvider,
    interfaces: Address,
    holograph_id: u32,
) -> Result<u16> {
    let call = IHolographInterfaces::getChainIdCall {
        fromChainType: CHAIN_TYPE_HOLOGRAPH,
        fromChainId: U256::from(holograph_id),
        toChainType: CHAIN_TYPE_LAYER_ZERO,
    };
    let id = call_view(provider, interfaces, &call).await?.toChainId;
    u16::try_from(id).map_err(|_| {
        DeployError::InvalidInput(format!(
            "LayerZero chain id {} for holograph id {} does not fit in uint16",
            id, holograph_id
        ))
    })
}

/// `lzReceive` delivery to `dest_module` that looks like it came from
/// `source_module` on the source chain.
pub async fn lz_receive_delivery(
    source_provider: &dyn ChainProvider,
    source_interfaces: Address,
    source_holograph_id: u32,
    source_module: Address,
    dest_module: Address,
) -> Result<Delivery> {
    let source_lz_chain_id =
        layer_zero_chain_id(source_provider, source_interfaces, source_holograph_id).await?;
    Ok(Delivery::LzReceive {
        target: dest_module,
        source_lz_chain_id,
        source_sender: source_module,
    })
}

/// Source chain side of a relay.
pub struct SourceContext<'a> {
    pub bridge: &'a dyn SourceBridge,
    /// Messaging gas parameters the source holds for the destination
    pub dest_gas: GasParameters,
}

/// Destination chain side of a relay.
pub struct DestinationContext<'a> {
    pub holograph_id: u32,
    pub operator: &'a dyn DestinationOperator,
    /// Account allowed to change the operator's messaging module
    pub operator_admin: Address,
    pub endpoint: &'a dyn MessageEndpoint,
    pub delivery: Delivery,
    /// Operator wallets able to execute jobs
    pub operator_wallets: &'a [Address],
}

/// A bridge-out to relay.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub target: Address,
    pub sender: Address,
    pub bridge_out_payload: Bytes,
    /// Bridge out with this job gas limit instead of the estimate
    pub gas_limit_override: Option<u64>,
}

/// Result of executing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(Receipt),
    /// The job ran out of gas and is waiting for `recoverJob`
    Failed { job_hash: B256, receipt: Receipt },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    fn from_receipt(job_hash: B256, receipt: Receipt) -> Self {
        let failed = receipt
            .decode_logs::<IHolographOperator::FailedOperatorJob>()
            .iter()
            .any(|e| e.jobHash == job_hash);
        if failed {
            JobOutcome::Failed { job_hash, receipt }
        } else {
            JobOutcome::Completed(receipt)
        }
    }
}

/// Everything observed while relaying.
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub estimate: CrossChainEstimate,
    /// Job gas limit the bridge-out request carried
    pub bridge_gas: U256,
    /// Payload the bridge emitted and the destination executed
    pub payload: Bytes,
    pub job_hash: B256,
    pub executor: Address,
    pub outcome: JobOutcome,
}

/// Payload of the `LzEvent` the source endpoint logged for a bridge-out.
pub fn emitted_payload(receipt: &Receipt) -> Option<Bytes> {
    receipt
        .decode_logs::<IMockLZEndpoint::LzEvent>()
        .into_iter()
        .next()
        .map(|e| e.payload)
}

/// Delivers `payload` to the destination operator.
pub async fn simulate_message(
    dest: &DestinationContext<'_>,
    gas_estimate: U256,
    payload: &Bytes,
) -> Result<Receipt> {
    let receipt = match &dest.delivery {
        Delivery::CrossChainMessage => {
            deliver_as_messaging_module(dest, gas_estimate, payload).await?
        }
        Delivery::LzReceive {
            target,
            source_lz_chain_id,
            source_sender,
        } => {
            let call = ILayerZeroModule::lzReceiveCall {
                srcChainId: *source_lz_chain_id,
                srcAddress: Bytes::copy_from_slice(source_sender.as_slice()),
                nonce: 0,
                payload: payload.clone(),
            };
            let data = Bytes::from(call.abi_encode());
            dest.endpoint.admin_call(*target, &data).await?
        }
    };

    let job_hash = keccak256(payload);
    let announced = receipt
        .decode_logs::<IHolographOperator::AvailableOperatorJob>()
        .iter()
        .any(|e| e.jobHash == job_hash);
    if announced {
        info!("Job {} is available on the destination", job_hash);
    } else {
        warn!("Delivery of job {} did not announce an available job", job_hash);
    }
    Ok(receipt)
}

/// The operator only accepts messages from its messaging module, so the
/// endpoint takes that role for the delivery and the original module is put
/// back afterwards, also when the delivery fails.
async fn deliver_as_messaging_module(
    dest: &DestinationContext<'_>,
    gas_estimate: U256,
    payload: &Bytes,
) -> Result<Receipt> {
    let endpoint = dest.endpoint.address();
    let operator = dest.operator.address();
    let original = dest.operator.messaging_module().await?;
    if original == endpoint {
        return dest
            .endpoint
            .cross_chain_message(operator, gas_estimate, payload)
            .await;
    }

    debug!("Temporarily setting messaging module of {} to {}", operator, endpoint);
    dest.operator
        .set_messaging_module(dest.operator_admin, endpoint)
        .await?;
    let delivered = dest
        .endpoint
        .cross_chain_message(operator, gas_estimate, payload)
        .await;
    let restored = dest
        .operator
        .set_messaging_module(dest.operator_admin, original)
        .await;
    debug!("Restored messaging module of {} to {}", operator, original);

    let receipt = delivered?;
    restored?;
    Ok(receipt)
}

/// The bonded operator if it is one of `wallets`, otherwise a random wallet.
pub fn select_executor<R: Rng + ?Sized>(
    job: &JobDetails,
    wallets: &[Address],
    rng: &mut R,
) -> Result<Address> {
    if job.operator != Address::ZERO && wallets.contains(&job.operator) {
        return Ok(job.operator);
    }
    wallets
        .choose(rng)
        .copied()
        .ok_or_else(|| DeployError::InvalidInput("no operator wallets supplied".to_string()))
}

/// Executes the job for `payload` and reports whether it completed.
pub async fn execute(
    operator: &dyn DestinationOperator,
    executor: Address,
    payload: &Bytes,
    gas_limit: u64,
) -> Result<JobOutcome> {
    let job_hash = keccak256(payload);
    let receipt = operator.execute_job(executor, payload, gas_limit).await?;
    let outcome = JobOutcome::from_receipt(job_hash, receipt);
    match &outcome {
        JobOutcome::Completed(_) => info!("Job {} executed by {}", job_hash, executor),
        JobOutcome::Failed { .. } => warn!("Job {} failed with gas limit {}", job_hash, gas_limit),
    }
    Ok(outcome)
}

/// Completes a failed job.
pub async fn recover(
    operator: &dyn DestinationOperator,
    executor: Address,
    payload: &Bytes,
    gas_limit: u64,
) -> Result<Receipt> {
    let job_hash = keccak256(payload);
    let receipt = operator.recover_job(executor, payload, gas_limit).await?;
    info!("Job {} recovered by {}", job_hash, executor);
    Ok(receipt)
}

/// Bridges `request` from source to destination and executes the job.
///
/// The destination runs the payload the bridge-out actually emitted, so a
/// `gas_limit_override` under-funds the job itself rather than the
/// execution transaction.
pub async fn relay(
    source: &SourceContext<'_>,
    dest: &DestinationContext<'_>,
    request: &RelayRequest,
) -> Result<RelayReport> {
    let estimate = estimate_cross_chain_execution(
        source.bridge,
        dest.operator,
        dest.holograph_id,
        request.target,
        &request.bridge_out_payload,
        &source.dest_gas,
    )
    .await?;

    let bridge_gas = match request.gas_limit_override {
        Some(gas) => {
            warn!(
                "Bridging out with job gas {} instead of the estimated {}",
                gas, estimate.estimated_gas
            );
            U256::from(gas)
        }
        None => estimate.estimated_gas,
    };

    let receipt = source
        .bridge
        .bridge_out_request(
            request.sender,
            dest.holograph_id,
            request.target,
            bridge_gas,
            GWEI,
            &request.bridge_out_payload,
            estimate.fee,
        )
        .await?;

    let payload = match emitted_payload(&receipt) {
        Some(payload) => payload,
        None => {
            debug!("Bridge-out receipt has no LzEvent, rebuilding the payload");
            source
                .bridge
                .bridge_out_request_payload(
                    dest.holograph_id,
                    request.target,
                    bridge_gas,
                    GWEI,
                    &request.bridge_out_payload,
                )
                .await?
        }
    };

    simulate_message(dest, lz_message_gas(&source.dest_gas, &payload), &payload).await?;

    let job_hash = keccak256(&payload);
    let job = dest.operator.job_details(job_hash).await?;
    let executor = select_executor(&job, dest.operator_wallets, &mut rand::thread_rng())?;

    let gas_limit = u64::try_from(estimate.estimated_gas).unwrap_or(u64::MAX);
    let outcome = execute(dest.operator, executor, &payload, gas_limit).await?;

    Ok(RelayReport {
        estimate,
        bridge_gas,
        payload,
        job_hash,
        executor,
        outcome,
    })
}

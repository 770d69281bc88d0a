//! Bridge, operator and messaging endpoint seams.
//!
//! The estimator and the relay talk to these traits; the `Rpc*` types back
//! them with deployed contracts reached through a [`ChainProvider`]. Writes
//! are node-signed from unlocked accounts, the way local test chains work.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use crate::abi::{IHolographBridge, IHolographOperator, IMockLZEndpoint};
use crate::crypto::keccak256;
use crate::error::{DeployError, Result};
use crate::provider::{
    call_view, send_and_wait, CallRequest, ChainProvider, NodeTransaction, Receipt, ReceiptPolling,
};

/// Fee quote for a bridge-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFee {
    pub protocol_fee: U256,
    pub messaging_fee: U256,
    pub dest_gas_price: U256,
}

impl MessageFee {
    pub fn total(&self) -> U256 {
        self.protocol_fee + self.messaging_fee
    }
}

/// Assignment of a pending job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDetails {
    /// Bonded operator selected for the job; zero when anyone may execute it
    pub operator: Address,
}

/// Source chain bridge.
#[async_trait]
pub trait SourceBridge: Send + Sync {
    async fn bridge_out_request_payload(
        &self,
        to_chain: u32,
        target: Address,
        gas_limit: U256,
        gas_price: U256,
        data: &Bytes,
    ) -> Result<Bytes>;

    async fn message_fee(
        &self,
        to_chain: u32,
        gas_limit: U256,
        gas_price: U256,
        payload: &Bytes,
    ) -> Result<MessageFee>;

    #[allow(clippy::too_many_arguments)]
    async fn bridge_out_request(
        &self,
        sender: Address,
        to_chain: u32,
        target: Address,
        gas_limit: U256,
        gas_price: U256,
        data: &Bytes,
        value: U256,
    ) -> Result<Receipt>;
}

/// Destination chain operator.
#[async_trait]
pub trait DestinationOperator: Send + Sync {
    fn address(&self) -> Address;

    /// Gas left after statically executing the job under `gas_limit`.
    async fn job_estimator(
        &self,
        payload: &Bytes,
        value: U256,
        gas_price: U256,
        gas_limit: u64,
    ) -> Result<U256>;

    async fn job_details(&self, job_hash: B256) -> Result<JobDetails>;

    async fn execute_job(&self, executor: Address, payload: &Bytes, gas_limit: u64)
        -> Result<Receipt>;

    async fn recover_job(&self, executor: Address, payload: &Bytes, gas_limit: u64)
        -> Result<Receipt>;

    /// Module the operator accepts deliveries from.
    async fn messaging_module(&self) -> Result<Address>;

    async fn set_messaging_module(&self, admin: Address, module: Address) -> Result<Receipt>;
}

/// Messaging endpoint that delivers payloads to the destination.
#[async_trait]
pub trait MessageEndpoint: Send + Sync {
    fn address(&self) -> Address;

    async fn cross_chain_message(
        &self,
        target: Address,
        gas_limit: U256,
        payload: &Bytes,
    ) -> Result<Receipt>;

    async fn admin_call(&self, target: Address, data: &Bytes) -> Result<Receipt>;
}

// ============================================================================
// JSON-RPC IMPLEMENTATIONS
// ============================================================================

/// `HolographBridge` reached over JSON-RPC.
pub struct RpcBridge {
    provider: Arc<dyn ChainProvider>,
    address: Address,
    caller: Address,
    polling: ReceiptPolling,
}

impl RpcBridge {
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        address: Address,
        caller: Address,
        polling: ReceiptPolling,
    ) -> Self {
        Self {
            provider,
            address,
            caller,
            polling,
        }
    }
}

#[async_trait]
impl SourceBridge for RpcBridge {
    async fn bridge_out_request_payload(
        &self,
        to_chain: u32,
        target: Address,
        gas_limit: U256,
        gas_price: U256,
        data: &Bytes,
    ) -> Result<Bytes> {
        let call = IHolographBridge::getBridgeOutRequestPayloadCall {
            toChain: to_chain,
            holographableContract: target,
            gasLimit: gas_limit,
            gasPrice: gas_price,
            bridgeOutPayload: data.clone(),
        };
        let request = CallRequest::to(self.address, call.abi_encode()).from(self.caller);
        let output = self.provider.call(&request).await?;
        let decoded =
            IHolographBridge::getBridgeOutRequestPayloadCall::abi_decode_returns(&output, true)?;
        Ok(decoded.samplePayload)
    }

    async fn message_fee(
        &self,
        to_chain: u32,
        gas_limit: U256,
        gas_price: U256,
        payload: &Bytes,
    ) -> Result<MessageFee> {
        let call = IHolographBridge::getMessageFeeCall {
            toChain: to_chain,
            gasLimit: gas_limit,
            gasPrice: gas_price,
            crossChainPayload: payload.clone(),
        };
        let fees = call_view(self.provider.as_ref(), self.address, &call).await?;
        Ok(MessageFee {
            protocol_fee: fees.hlgFee,
            messaging_fee: fees.msgFee,
            dest_gas_price: fees.dstGasPrice,
        })
    }

    async fn bridge_out_request(
        &self,
        sender: Address,
        to_chain: u32,
        target: Address,
        gas_limit: U256,
        gas_price: U256,
        data: &Bytes,
        value: U256,
    ) -> Result<Receipt> {
        let call = IHolographBridge::bridgeOutRequestCall {
            toChain: to_chain,
            holographableContract: target,
            gasLimit: gas_limit,
            gasPrice: gas_price,
            bridgeOutPayload: data.clone(),
        };
        let tx = NodeTransaction {
            from: sender,
            to: Some(self.address),
            data: call.abi_encode().into(),
            value,
            gas_limit: None,
            nonce: None,
            price: None,
        };
        send_and_wait(self.provider.as_ref(), &tx, self.polling).await
    }
}

/// `HolographOperator` reached over JSON-RPC.
pub struct RpcOperator {
    provider: Arc<dyn ChainProvider>,
    address: Address,
    polling: ReceiptPolling,
}

impl RpcOperator {
    pub fn new(provider: Arc<dyn ChainProvider>, address: Address, polling: ReceiptPolling) -> Self {
        Self {
            provider,
            address,
            polling,
        }
    }

    async fn send_job(
        &self,
        executor: Address,
        data: Vec<u8>,
        payload: &Bytes,
        gas_limit: u64,
    ) -> Result<Receipt> {
        let tx = NodeTransaction {
            from: executor,
            to: Some(self.address),
            data: data.into(),
            value: U256::ZERO,
            gas_limit: Some(gas_limit),
            nonce: None,
            price: None,
        };
        send_and_wait(self.provider.as_ref(), &tx, self.polling)
            .await
            .map_err(|e| map_job_error(e, payload))
    }
}

/// Rejections of replayed or unknown jobs become [`DeployError::InvalidJob`].
fn map_job_error(error: DeployError, payload: &Bytes) -> DeployError {
    match &error {
        DeployError::Rpc { message, .. } if message.contains("HOLOGRAPH: invalid job") => {
            DeployError::InvalidJob(keccak256(payload))
        }
        _ => error,
    }
}

#[async_trait]
impl DestinationOperator for RpcOperator {
    fn address(&self) -> Address {
        self.address
    }

    async fn job_estimator(
        &self,
        payload: &Bytes,
        value: U256,
        gas_price: U256,
        gas_limit: u64,
    ) -> Result<U256> {
        let call = IHolographOperator::jobEstimatorCall {
            bridgeInRequestPayload: payload.clone(),
        };
        let request = CallRequest::to(self.address, call.abi_encode())
            .value(value)
            .gas(gas_limit)
            .gas_price(gas_price);
        let output = self.provider.call(&request).await?;
        Ok(IHolographOperator::jobEstimatorCall::abi_decode_returns(&output, true)?._0)
    }

    async fn job_details(&self, job_hash: B256) -> Result<JobDetails> {
        let call = IHolographOperator::getJobDetailsCall { jobHash: job_hash };
        let job = call_view(self.provider.as_ref(), self.address, &call).await?._0;
        Ok(JobDetails {
            operator: job.operator,
        })
    }

    async fn execute_job(
        &self,
        executor: Address,
        payload: &Bytes,
        gas_limit: u64,
    ) -> Result<Receipt> {
        let call = IHolographOperator::executeJobCall {
            bridgeInRequestPayload: payload.clone(),
        };
        self.send_job(executor, call.abi_encode(), payload, gas_limit)
            .await
    }

    async fn recover_job(
        &self,
        executor: Address,
        payload: &Bytes,
        gas_limit: u64,
    ) -> Result<Receipt> {
        let call = IHolographOperator::recoverJobCall {
            bridgeInRequestPayload: payload.clone(),
        };
        self.send_job(executor, call.abi_encode(), payload, gas_limit)
            .await
    }

    async fn messaging_module(&self) -> Result<Address> {
        let call = IHolographOperator::getMessagingModuleCall {};
        Ok(call_view(self.provider.as_ref(), self.address, &call).await?._0)
    }

    async fn set_messaging_module(&self, admin: Address, module: Address) -> Result<Receipt> {
        let call = IHolographOperator::setMessagingModuleCall {
            messagingModule: module,
        };
        let tx = NodeTransaction {
            from: admin,
            to: Some(self.address),
            data: call.abi_encode().into(),
            value: U256::ZERO,
            gas_limit: None,
            nonce: None,
            price: None,
        };
        send_and_wait(self.provider.as_ref(), &tx, self.polling).await
    }
}

/// Mock LayerZero endpoint reached over JSON-RPC.
pub struct RpcEndpoint {
    provider: Arc<dyn ChainProvider>,
    address: Address,
    caller: Address,
    polling: ReceiptPolling,
}

impl RpcEndpoint {
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        address: Address,
        caller: Address,
        polling: ReceiptPolling,
    ) -> Self {
        Self {
            provider,
            address,
            caller,
            polling,
        }
    }

    async fn send(&self, data: Vec<u8>) -> Result<Receipt> {
        let tx = NodeTransaction {
            from: self.caller,
            to: Some(self.address),
            data: data.into(),
            value: U256::ZERO,
            gas_limit: None,
            nonce: None,
            price: None,
        };
        send_and_wait(self.provider.as_ref(), &tx, self.polling).await
    }
}

#[async_trait]
impl MessageEndpoint for RpcEndpoint {
    fn address(&self) -> Address {
        self.address
    }

    async fn cross_chain_message(
        &self,
        target: Address,
        gas_limit: U256,
        payload: &Bytes,
    ) -> Result<Receipt> {
        let call = IMockLZEndpoint::crossChainMessageCall {
            target,
            gasLimit: gas_limit,
            payload: payload.clone(),
        };
        self.send(call.abi_encode()).await
    }

    async fn admin_call(&self, target: Address, data: &Bytes) -> Result<Receipt> {
        let call = IMockLZEndpoint::adminCallCall {
            target,
            payload: data.clone(),
        };
        self.send(call.abi_encode()).await
    }
}

//! Shared test helpers
//!
//! This module provides helpers used by the integration tests.
//!
//! The module is organized into several categories:
//! - **Constants**: dummy keys, secrets and contract addresses
//! - **Configuration Builders**: networks, configs, flags and sessions
//! - **In-Memory Chain**: a [`ChainProvider`] backed by maps instead of a node
//! - **Relay Fakes**: bridge, operator and endpoint sharing one job table

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;

use holograph_deployer::abi::{IHolographOperator, ILayerZeroModule, IMockLZEndpoint};
use holograph_deployer::config::{
    Config, ContractsConfig, DeployerConfig, EnvFlags, GasConfig, NetworkConfig, NetworkType,
};
use holograph_deployer::contracts::{
    DestinationOperator, JobDetails, MessageEndpoint, MessageFee, SourceBridge,
};
use holograph_deployer::crypto::{keccak256, DeployerKey};
use holograph_deployer::error::{DeployError, Result};
use holograph_deployer::provider::{CallRequest, ChainProvider, Log, NodeTransaction, Receipt};
use holograph_deployer::session::{DeploymentSession, TransactionSigner};

// ============================================================================
// CONSTANTS
// ============================================================================

// --------------------------------- KEYS ---------------------------------

/// First default Hardhat account
pub const DUMMY_DEPLOYER_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address of [`DUMMY_DEPLOYER_KEY`]
pub const DUMMY_DEPLOYER_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Dummy deployer secret
pub const DUMMY_SECRET: &str = "holograph-test-secret";

// ------------------------------ CONTRACTS -------------------------------

pub const DUMMY_GENESIS_ADDR: &str = "0x0000000000000000000000000000000000000001";
pub const DUMMY_HOLOGRAPH_ADDR: &str = "0x0000000000000000000000000000000000000002";
pub const DUMMY_FACTORY_ADDR: &str = "0x0000000000000000000000000000000000000003";
pub const DUMMY_REGISTRY_ADDR: &str = "0x0000000000000000000000000000000000000004";
pub const DUMMY_BRIDGE_ADDR: &str = "0x0000000000000000000000000000000000000005";
pub const DUMMY_OPERATOR_ADDR: &str = "0x0000000000000000000000000000000000000006";
pub const DUMMY_LZ_MODULE_ADDR: &str = "0x0000000000000000000000000000000000000007";
pub const DUMMY_MULTISIG_ADDR: &str = "0x0000000000000000000000000000000000000008";
pub const DUMMY_TARGET_ADDR: &str = "0x0000000000000000000000000000000000000009";
pub const DUMMY_STRANGER_ADDR: &str = "0x000000000000000000000000000000000000000a";
pub const DUMMY_ENDPOINT_ADDR: &str = "0x000000000000000000000000000000000000000b";

// -------------------------------- USERS ---------------------------------

pub const DUMMY_OPERATOR_WALLET_1: &str = "0x00000000000000000000000000000000000000a1";
pub const DUMMY_OPERATOR_WALLET_2: &str = "0x00000000000000000000000000000000000000a2";
pub const DUMMY_SENDER_ADDR: &str = "0x00000000000000000000000000000000000000b1";

/// Parses one of the address constants.
pub fn addr(value: &str) -> Address {
    value.parse().unwrap()
}

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

pub fn build_test_network(key: &str, chain_id: u64, holograph_id: u32) -> NetworkConfig {
    NetworkConfig {
        key: key.to_string(),
        name: key.to_string(),
        chain_id,
        holograph_id,
        rpc_url: format!("http://127.0.0.1:{}", 8545 + chain_id % 1000),
        network_type: NetworkType::Local,
        active: true,
        protocol_multisig: None,
    }
}

/// Two local chains plus a testnet, with every protocol contract configured.
pub fn build_test_config() -> Config {
    Config {
        deployer: DeployerConfig::default(),
        gas: GasConfig {
            receipt_poll_interval_ms: 1,
            receipt_max_attempts: 3,
            ..GasConfig::default()
        },
        contracts: ContractsConfig {
            genesis: Some(addr(DUMMY_GENESIS_ADDR)),
            genesis_local: Some(addr(DUMMY_GENESIS_ADDR)),
            holograph: Some(addr(DUMMY_HOLOGRAPH_ADDR)),
            factory: Some(addr(DUMMY_FACTORY_ADDR)),
            registry: Some(addr(DUMMY_REGISTRY_ADDR)),
            bridge: Some(addr(DUMMY_BRIDGE_ADDR)),
            operator: Some(addr(DUMMY_OPERATOR_ADDR)),
            interfaces: None,
            layer_zero_module: Some(addr(DUMMY_LZ_MODULE_ADDR)),
        },
        networks: vec![
            build_test_network("localhost", 1338, 4294967294),
            build_test_network("localhost2", 1339, 4294967293),
            NetworkConfig {
                network_type: NetworkType::Testnet,
                ..build_test_network("ethereumTestnetSepolia", 11155111, 4000000001)
            },
        ],
    }
}

/// Variable lookup that only knows the deployer secrets.
pub fn secret_lookup(name: &str) -> Option<String> {
    match name {
        "DEPLOYER_SECRET" | "LOCALHOST_DEPLOYER_SECRET" => Some(DUMMY_SECRET.to_string()),
        _ => None,
    }
}

pub fn build_test_key() -> DeployerKey {
    DeployerKey::from_hex(DUMMY_DEPLOYER_KEY).unwrap()
}

/// Session signing locally with the dummy key.
pub fn build_local_session(config: Config, flags: EnvFlags) -> DeploymentSession {
    DeploymentSession::new(config, flags, TransactionSigner::Local(build_test_key()))
}

/// Session whose transactions the node signs for the dummy deployer, so the
/// in-memory chain can record them field by field.
pub fn build_node_session(config: Config, flags: EnvFlags) -> DeploymentSession {
    DeploymentSession::new(
        config,
        flags,
        TransactionSigner::Node(addr(DUMMY_DEPLOYER_ADDR)),
    )
}

// ============================================================================
// IN-MEMORY CHAIN
// ============================================================================

#[derive(Default)]
struct ChainState {
    code: HashMap<Address, Bytes>,
    views: HashMap<(Address, Bytes), Bytes>,
    selector_views: HashMap<(Address, [u8; 4]), Bytes>,
    transaction_count: u64,
    gas_price: U256,
    base_fee: Option<U256>,
    estimate: Option<u64>,
    fail_sends: bool,
    raw_sent: Vec<Bytes>,
    node_sent: Vec<NodeTransaction>,
    receipts: HashMap<B256, Receipt>,
    next_logs: Vec<Log>,
    deploy_on_send: Option<Address>,
}

/// [`ChainProvider`] over in-memory state. Every accepted transaction is
/// mined immediately with a successful receipt.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Self {
        let chain = Self::default();
        {
            let mut state = chain.state.lock().unwrap();
            state.gas_price = U256::from(2_000_000_000u64);
            state.estimate = Some(100_000);
        }
        chain
    }

    pub fn set_code(&self, address: Address) {
        self.state
            .lock()
            .unwrap()
            .code
            .insert(address, Bytes::from_static(&[0x60, 0x80]));
    }

    /// Answers `eth_call` to `to` with exactly this calldata.
    pub fn set_view<C: SolCall>(&self, to: Address, call: &C, output: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .views
            .insert((to, Bytes::from(call.abi_encode())), Bytes::from(output));
    }

    /// Answers every `eth_call` to `to` with selector `C::SELECTOR`.
    pub fn set_selector_view<C: SolCall>(&self, to: Address, output: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .selector_views
            .insert((to, C::SELECTOR), Bytes::from(output));
    }

    /// `admin()` of `target`.
    pub fn set_admin(&self, target: Address, admin: Address) {
        self.set_selector_view::<holograph_deployer::abi::IAdmin::adminCall>(
            target,
            admin.abi_encode(),
        );
    }

    /// `owner()` of `target`.
    pub fn set_owner(&self, target: Address, owner: Address) {
        self.set_selector_view::<holograph_deployer::abi::IOwner::ownerCall>(
            target,
            owner.abi_encode(),
        );
    }

    pub fn set_transaction_count(&self, count: u64) {
        self.state.lock().unwrap().transaction_count = count;
    }

    pub fn set_base_fee(&self, base_fee: Option<U256>) {
        self.state.lock().unwrap().base_fee = base_fee;
    }

    /// `None` makes `eth_estimateGas` fail.
    pub fn set_estimate(&self, estimate: Option<u64>) {
        self.state.lock().unwrap().estimate = estimate;
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_sends = fail;
    }

    /// Logs attached to the receipt of the next transaction.
    pub fn set_next_logs(&self, logs: Vec<Log>) {
        self.state.lock().unwrap().next_logs = logs;
    }

    /// The next transaction leaves code at `address`.
    pub fn deploy_on_next_send(&self, address: Address) {
        self.state.lock().unwrap().deploy_on_send = Some(address);
    }

    pub fn node_sent(&self) -> Vec<NodeTransaction> {
        self.state.lock().unwrap().node_sent.clone()
    }

    pub fn raw_sent(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().raw_sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.raw_sent.len() + state.node_sent.len()
    }

    fn accept(&self, state: &mut ChainState) -> Result<B256> {
        if state.fail_sends {
            return Err(DeployError::Rpc {
                url: "fake".to_string(),
                code: -32000,
                message: "nonce too low".to_string(),
            });
        }
        let sequence = (state.raw_sent.len() + state.node_sent.len()) as u64;
        let hash = keccak256(sequence.to_be_bytes());
        if let Some(address) = state.deploy_on_send.take() {
            state.code.insert(address, Bytes::from_static(&[0x60, 0x80]));
        }
        let logs = std::mem::take(&mut state.next_logs);
        state.receipts.insert(hash, successful_receipt(hash, logs));
        state.transaction_count += 1;
        Ok(hash)
    }
}

#[async_trait]
impl ChainProvider for FakeChain {
    fn endpoint(&self) -> &str {
        "fake"
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(1338)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(1)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        let state = self.state.lock().unwrap();
        let to = request.to.unwrap_or_default();
        if let Some(output) = state.views.get(&(to, request.data.clone())) {
            return Ok(output.clone());
        }
        if request.data.len() >= 4 {
            let mut selector = [0u8; 4];
            selector.copy_from_slice(&request.data[..4]);
            if let Some(output) = state.selector_views.get(&(to, selector)) {
                return Ok(output.clone());
            }
        }
        Err(DeployError::Rpc {
            url: "fake".to_string(),
            code: 3,
            message: "execution reverted".to_string(),
        })
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64> {
        self.state
            .lock()
            .unwrap()
            .estimate
            .ok_or_else(|| DeployError::Rpc {
                url: "fake".to_string(),
                code: 3,
                message: "execution reverted".to_string(),
            })
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64> {
        Ok(self.state.lock().unwrap().transaction_count)
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn base_fee_per_gas(&self) -> Result<Option<U256>> {
        Ok(self.state.lock().unwrap().base_fee)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256> {
        let mut state = self.state.lock().unwrap();
        let hash = self.accept(&mut state)?;
        state.raw_sent.push(raw.clone());
        Ok(hash)
    }

    async fn send_transaction(&self, tx: &NodeTransaction) -> Result<B256> {
        let mut state = self.state.lock().unwrap();
        let hash = self.accept(&mut state)?;
        state.node_sent.push(tx.clone());
        Ok(hash)
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }
}

pub fn successful_receipt(hash: B256, logs: Vec<Log>) -> Receipt {
    Receipt {
        transaction_hash: hash,
        status: true,
        block_number: Some(1),
        gas_used: 21_000,
        contract_address: None,
        logs,
    }
}

/// Log emitted by `address` for `event`.
pub fn event_log<E: SolEvent>(address: Address, event: &E) -> Log {
    let data = event.encode_log_data();
    Log {
        address,
        topics: data.topics().to_vec(),
        data: data.data.clone(),
    }
}

// ============================================================================
// RELAY FAKES
// ============================================================================

/// Gas a fake job needs: 50k plus 10 per payload byte.
pub fn job_gas_needed(payload: &Bytes) -> u64 {
    50_000 + 10 * payload.len() as u64
}

/// Job gas limit carried by a [`FakeBridge`] payload (third word), if any.
pub fn payload_job_gas(payload: &Bytes) -> Option<u64> {
    let word = payload.get(64..96)?;
    let gas = U256::from_be_slice(word);
    Some(u64::try_from(gas).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Failed,
    Completed,
}

/// Operator keeping jobs keyed by payload hash. Executing or recovering a
/// job in the wrong state is rejected as an invalid job. Deliveries are only
/// accepted from the current messaging module, which starts out as the
/// LayerZero module.
pub struct FakeOperator {
    address: Address,
    bonded: Address,
    jobs: Mutex<HashMap<B256, JobState>>,
    executors: Mutex<Vec<Address>>,
    messaging_module: Mutex<Address>,
    module_changes: Mutex<Vec<(Address, Address)>>,
}

impl FakeOperator {
    pub fn new(address: Address, bonded: Address) -> Self {
        Self {
            address,
            bonded,
            jobs: Mutex::new(HashMap::new()),
            executors: Mutex::new(Vec::new()),
            messaging_module: Mutex::new(addr(DUMMY_LZ_MODULE_ADDR)),
            module_changes: Mutex::new(Vec::new()),
        }
    }

    pub fn current_messaging_module(&self) -> Address {
        *self.messaging_module.lock().unwrap()
    }

    /// `(sender, module)` of every `setMessagingModule`.
    pub fn module_changes(&self) -> Vec<(Address, Address)> {
        self.module_changes.lock().unwrap().clone()
    }

    /// Delivery from `sender`, rejected unless it is the messaging module.
    pub fn receive_from(&self, sender: Address, payload: &Bytes) -> Result<Receipt> {
        if sender != self.current_messaging_module() {
            return Err(DeployError::Rpc {
                url: "fake".to_string(),
                code: 3,
                message: "HOLOGRAPH: messaging only call".to_string(),
            });
        }
        Ok(self.receive(payload))
    }

    pub fn job_state(&self, job_hash: B256) -> Option<JobState> {
        self.jobs.lock().unwrap().get(&job_hash).copied()
    }

    pub fn executors(&self) -> Vec<Address> {
        self.executors.lock().unwrap().clone()
    }

    /// Makes a job available, as the messaging module does on delivery.
    pub fn receive(&self, payload: &Bytes) -> Receipt {
        let job_hash = keccak256(payload);
        self.jobs.lock().unwrap().insert(job_hash, JobState::Pending);
        let event = IHolographOperator::AvailableOperatorJob {
            jobHash: job_hash,
            payload: payload.clone(),
        };
        successful_receipt(job_hash, vec![event_log(self.address, &event)])
    }

    /// Executing forwards at most the job gas the payload carries; recovery
    /// forwards the whole transaction gas.
    fn run(&self, executor: Address, payload: &Bytes, gas_limit: u64, expected: JobState) -> Result<Receipt> {
        let job_hash = keccak256(payload);
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.get(&job_hash) != Some(&expected) {
            return Err(DeployError::InvalidJob(job_hash));
        }
        self.executors.lock().unwrap().push(executor);

        let available = match (expected, payload_job_gas(payload)) {
            (JobState::Pending, Some(job_gas)) => gas_limit.min(job_gas),
            _ => gas_limit,
        };
        if available < job_gas_needed(payload) {
            if expected == JobState::Failed {
                return Err(DeployError::Reverted(job_hash));
            }
            jobs.insert(job_hash, JobState::Failed);
            let event = IHolographOperator::FailedOperatorJob { jobHash: job_hash };
            return Ok(successful_receipt(job_hash, vec![event_log(self.address, &event)]));
        }

        jobs.insert(job_hash, JobState::Completed);
        Ok(successful_receipt(job_hash, vec![]))
    }
}

#[async_trait]
impl DestinationOperator for FakeOperator {
    fn address(&self) -> Address {
        self.address
    }

    async fn job_estimator(
        &self,
        payload: &Bytes,
        _value: U256,
        _gas_price: U256,
        gas_limit: u64,
    ) -> Result<U256> {
        Ok(U256::from(gas_limit.saturating_sub(job_gas_needed(payload))))
    }

    async fn job_details(&self, _job_hash: B256) -> Result<JobDetails> {
        Ok(JobDetails {
            operator: self.bonded,
        })
    }

    async fn execute_job(&self, executor: Address, payload: &Bytes, gas_limit: u64) -> Result<Receipt> {
        self.run(executor, payload, gas_limit, JobState::Pending)
    }

    async fn recover_job(&self, executor: Address, payload: &Bytes, gas_limit: u64) -> Result<Receipt> {
        self.run(executor, payload, gas_limit, JobState::Failed)
    }

    async fn messaging_module(&self) -> Result<Address> {
        Ok(self.current_messaging_module())
    }

    async fn set_messaging_module(&self, admin: Address, module: Address) -> Result<Receipt> {
        self.module_changes.lock().unwrap().push((admin, module));
        *self.messaging_module.lock().unwrap() = module;
        Ok(successful_receipt(B256::ZERO, vec![]))
    }
}

/// Endpoint at [`DUMMY_ENDPOINT_ADDR`] that hands payloads to a
/// [`FakeOperator`]. `crossChainMessage` calls the operator as the endpoint;
/// `adminCall` has the target module call it.
pub struct FakeEndpoint {
    operator: Arc<FakeOperator>,
}

impl FakeEndpoint {
    pub fn new(operator: Arc<FakeOperator>) -> Self {
        Self { operator }
    }
}

#[async_trait]
impl MessageEndpoint for FakeEndpoint {
    fn address(&self) -> Address {
        addr(DUMMY_ENDPOINT_ADDR)
    }

    async fn cross_chain_message(
        &self,
        _target: Address,
        _gas_limit: U256,
        payload: &Bytes,
    ) -> Result<Receipt> {
        self.operator.receive_from(self.address(), payload)
    }

    async fn admin_call(&self, target: Address, data: &Bytes) -> Result<Receipt> {
        let call = ILayerZeroModule::lzReceiveCall::abi_decode(data, true)?;
        self.operator.receive_from(target, &call.payload)
    }
}

/// Bridge whose payload encodes the requested gas values, so the payload
/// changes between estimation passes. Bridge-out receipts carry the emitted
/// payload in an `LzEvent` unless built with [`FakeBridge::without_lz_event`].
#[derive(Default)]
pub struct FakeBridge {
    requests: Mutex<Vec<(Address, U256, U256)>>,
    silent: bool,
}

pub const FAKE_PROTOCOL_FEE: u64 = 1_000;
pub const FAKE_MESSAGING_FEE: u64 = 2_000;

impl FakeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_lz_event() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    fn payload(to_chain: u32, target: Address, gas_limit: U256, gas_price: U256, data: &Bytes) -> Bytes {
        Bytes::from((to_chain, target, gas_limit, gas_price, data.clone()).abi_encode_params())
    }

    /// `(sender, gas_limit, value)` of every bridge-out request.
    pub fn requests(&self) -> Vec<(Address, U256, U256)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceBridge for FakeBridge {
    async fn bridge_out_request_payload(
        &self,
        to_chain: u32,
        target: Address,
        gas_limit: U256,
        gas_price: U256,
        data: &Bytes,
    ) -> Result<Bytes> {
        Ok(Self::payload(to_chain, target, gas_limit, gas_price, data))
    }

    async fn message_fee(
        &self,
        _to_chain: u32,
        _gas_limit: U256,
        gas_price: U256,
        _payload: &Bytes,
    ) -> Result<MessageFee> {
        Ok(MessageFee {
            protocol_fee: U256::from(FAKE_PROTOCOL_FEE),
            messaging_fee: U256::from(FAKE_MESSAGING_FEE),
            dest_gas_price: gas_price,
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
        self.requests.lock().unwrap().push((sender, gas_limit, value));
        if self.silent {
            return Ok(successful_receipt(B256::ZERO, vec![]));
        }
        let event = IMockLZEndpoint::LzEvent {
            dstChainId: 0,
            destination: Bytes::new(),
            payload: Self::payload(to_chain, target, gas_limit, gas_price, data),
        };
        Ok(successful_receipt(B256::ZERO, vec![event_log(addr(DUMMY_ENDPOINT_ADDR), &event)]))
    }
}

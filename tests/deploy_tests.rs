//! Unit tests for the idempotent deploy steps
//!
//! These tests verify genesis deployments, holographable contract
//! deployments through the factory, and reconciliation of messaging
//! configuration against an in-memory chain.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};

use holograph_deployer::abi::{
    IHolographFactory, IHolographOperator, IHolographRegistry, ILayerZeroModule, LzGasParameters,
};
use holograph_deployer::address::{generate_deploy_code, Genesis, GENESIS_LOCAL};
use holograph_deployer::config::{EnvFlags, NetworkConfig};
use holograph_deployer::config_builder::{build_erc20_config, BuiltConfig, Erc20ConfigParams, InMemoryArtifacts};
use holograph_deployer::crypto::{deployer_secret_hash, eip191_hash, recover_signer, Signature};
use holograph_deployer::deploy::{
    deploy_holographable, ensure_messaging_module, ensure_optimism_gas_price_oracle,
    genesis_deploy, read_gas_parameters, reconcile_gas_parameters, DeployOutcome,
    OvmGasPriceOracleParams,
};
use holograph_deployer::dispatcher::{Dispatcher, FormatterRegistry, RecordingApproval};
use holograph_deployer::error::DeployError;
use holograph_deployer::events::all_events_enabled;
use holograph_deployer::gas::{network_gas_parameters, GasParameters};

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    addr, build_local_session, build_node_session, build_test_config, event_log, FakeChain,
    DUMMY_DEPLOYER_ADDR, DUMMY_FACTORY_ADDR, DUMMY_GENESIS_ADDR, DUMMY_LZ_MODULE_ADDR,
    DUMMY_OPERATOR_ADDR, DUMMY_REGISTRY_ADDR, DUMMY_SECRET, DUMMY_TARGET_ADDR,
};

fn localhost() -> NetworkConfig {
    build_test_config().networks[0].clone()
}

fn genesis() -> Genesis {
    Genesis::new(GENESIS_LOCAL, addr(DUMMY_GENESIS_ADDR), deployer_secret_hash(DUMMY_SECRET))
}

fn bytecode() -> Bytes {
    Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52])
}

fn dry_run() -> EnvFlags {
    EnvFlags {
        dry_run: true,
        ..EnvFlags::default()
    }
}

fn sample_config() -> BuiltConfig {
    let artifacts = InMemoryArtifacts::new().with("SampleERC20", bytecode());
    build_erc20_config(
        &artifacts,
        &localhost(),
        addr(DUMMY_DEPLOYER_ADDR),
        &Erc20ConfigParams {
            contract_name: "SampleERC20",
            token_name: "Sample ERC20 Token",
            token_symbol: "SMPL",
            domain_separator: "Sample ERC20 Token",
            domain_version: "1",
            decimals: 18,
            event_config: all_events_enabled(),
            init_code: Bytes::new(),
            salt: B256::ZERO,
        },
    )
    .unwrap()
}

// ============================================================================
// GENESIS DEPLOYMENTS
// ============================================================================

/// Test that an already deployed contract is reused
/// Why: Deploy runs are repeated; existing contracts must not be redeployed
#[tokio::test]
async fn test_genesis_deploy_reuses_existing_code() {
    let chain = FakeChain::new();
    chain.set_code(addr(DUMMY_GENESIS_ADDR));
    let future = genesis().future_address(B256::ZERO, &bytecode());
    chain.set_code(future);
    let session = build_node_session(build_test_config(), EnvFlags::default());

    let outcome = genesis_deploy(
        &session,
        &localhost(),
        &chain,
        &genesis(),
        "Holograph",
        B256::ZERO,
        &bytecode(),
        &Bytes::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome, DeployOutcome::Reused(future));
    assert_eq!(chain.sent_count(), 0);
}

/// Test a fresh genesis deployment
/// Why: Genesis must receive the deploy calldata and leave code at the future address
#[tokio::test]
async fn test_genesis_deploy_sends_deploy_code() {
    let chain = FakeChain::new();
    chain.set_code(addr(DUMMY_GENESIS_ADDR));
    let future = genesis().future_address(B256::ZERO, &bytecode());
    chain.deploy_on_next_send(future);
    let session = build_node_session(build_test_config(), EnvFlags::default());
    let init_code = Bytes::from_static(&[0x01]);

    let outcome = genesis_deploy(
        &session,
        &localhost(),
        &chain,
        &genesis(),
        "Holograph",
        B256::ZERO,
        &bytecode(),
        &init_code,
    )
    .await
    .unwrap();

    assert_eq!(outcome, DeployOutcome::Deployed(future));
    assert_eq!(outcome.address(), Some(future));
    let sent = chain.node_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(addr(DUMMY_GENESIS_ADDR)));
    assert_eq!(
        sent[0].data,
        generate_deploy_code(1338, B256::ZERO, genesis().secret, &bytecode(), &init_code)
    );
}

/// Test that a deployment leaving no code is an error
/// Why: A silently failed deployment would break every later step
#[tokio::test]
async fn test_genesis_deploy_without_resulting_code() {
    let chain = FakeChain::new();
    chain.set_code(addr(DUMMY_GENESIS_ADDR));
    let session = build_node_session(build_test_config(), EnvFlags::default());

    let result = genesis_deploy(
        &session,
        &localhost(),
        &chain,
        &genesis(),
        "Holograph",
        B256::ZERO,
        &bytecode(),
        &Bytes::new(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(chain.sent_count(), 1);
}

/// Test that DRY_RUN reports the address without sending
/// Why: Dry runs are used to preview addresses before spending gas
#[tokio::test]
async fn test_genesis_deploy_dry_run() {
    let chain = FakeChain::new();
    chain.set_code(addr(DUMMY_GENESIS_ADDR));
    let session = build_node_session(build_test_config(), dry_run());

    let outcome = genesis_deploy(
        &session,
        &localhost(),
        &chain,
        &genesis(),
        "Holograph",
        B256::ZERO,
        &bytecode(),
        &Bytes::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        DeployOutcome::DryRun(Some(genesis().future_address(B256::ZERO, &bytecode())))
    );
    assert_eq!(chain.sent_count(), 0);
}

// ============================================================================
// HOLOGRAPHABLE CONTRACTS
// ============================================================================

fn registry_returns(chain: &FakeChain, built: &BuiltConfig, address: Address) {
    chain.set_view(
        addr(DUMMY_REGISTRY_ADDR),
        &IHolographRegistry::getHolographedHashAddressCall {
            hash: built.config_hash,
        },
        address.abi_encode(),
    );
}

/// Test that the factory deployment is signed by the deployer and parsed from its event
/// Why: The factory only deploys configs signed by the declared signer
#[tokio::test]
async fn test_deploy_holographable() {
    let chain = FakeChain::new();
    let built = sample_config();
    registry_returns(&chain, &built, Address::ZERO);
    chain.set_next_logs(vec![event_log(
        addr(DUMMY_FACTORY_ADDR),
        &IHolographFactory::BridgeableContractDeployed {
            contractAddress: addr(DUMMY_TARGET_ADDR),
            hash: built.config_hash,
        },
    )]);
    let session = build_local_session(build_test_config(), EnvFlags::default());

    let outcome = deploy_holographable(&session, &localhost(), &chain, &built)
        .await
        .unwrap();

    assert_eq!(outcome, DeployOutcome::Deployed(addr(DUMMY_TARGET_ADDR)));
    assert_eq!(chain.raw_sent().len(), 1);
}

/// Test the signature carried in the factory call
/// Why: The factory recovers the signer from the EIP-191 hash of the config hash
#[tokio::test]
async fn test_deploy_holographable_signature() {
    let built = sample_config();
    let session = build_local_session(build_test_config(), EnvFlags::default());
    let key = match session.signer() {
        holograph_deployer::session::TransactionSigner::Local(key) => key.clone(),
        _ => unreachable!(),
    };

    let signature: Signature = key.sign_message(built.config_hash).unwrap();
    let call = IHolographFactory::deployHolographableContractCall {
        config: built.config.to_abi(),
        signature: holograph_deployer::abi::Verification {
            r: signature.r,
            s: signature.s,
            v: signature.v,
        },
        signer: key.address(),
    };
    let decoded = IHolographFactory::deployHolographableContractCall::abi_decode(&call.abi_encode(), true)
        .unwrap();

    let recovered = recover_signer(
        eip191_hash(built.config_hash),
        &Signature {
            r: decoded.signature.r,
            s: decoded.signature.s,
            v: decoded.signature.v,
        },
    )
    .unwrap();
    assert_eq!(recovered, decoded.signer);
    assert_eq!(recovered, addr(DUMMY_DEPLOYER_ADDR));
}

/// Test that a config known to the registry is reused
/// Why: Redeploying the same config hash would revert on-chain
#[tokio::test]
async fn test_deploy_holographable_reuses_registered_config() {
    let chain = FakeChain::new();
    let built = sample_config();
    registry_returns(&chain, &built, addr(DUMMY_TARGET_ADDR));
    let session = build_local_session(build_test_config(), EnvFlags::default());

    let outcome = deploy_holographable(&session, &localhost(), &chain, &built)
        .await
        .unwrap();

    assert_eq!(outcome, DeployOutcome::Reused(addr(DUMMY_TARGET_ADDR)));
    assert_eq!(chain.sent_count(), 0);
}

/// Test the failure modes of holographable deployment
/// Why: A node signer cannot produce the config signature, and a missing event means no contract
#[tokio::test]
async fn test_deploy_holographable_failures() {
    let built = sample_config();

    let chain = FakeChain::new();
    registry_returns(&chain, &built, Address::ZERO);
    let session = build_node_session(build_test_config(), EnvFlags::default());
    let err = deploy_holographable(&session, &localhost(), &chain, &built)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::InvalidInput(_)));

    let chain = FakeChain::new();
    registry_returns(&chain, &built, Address::ZERO);
    let session = build_local_session(build_test_config(), EnvFlags::default());
    let err = deploy_holographable(&session, &localhost(), &chain, &built)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("BridgeableContractDeployed"));

    let chain = FakeChain::new();
    registry_returns(&chain, &built, Address::ZERO);
    let session = build_local_session(build_test_config(), dry_run());
    let outcome = deploy_holographable(&session, &localhost(), &chain, &built)
        .await
        .unwrap();
    assert_eq!(outcome, DeployOutcome::DryRun(None));
    assert_eq!(chain.sent_count(), 0);
}

// ============================================================================
// CONFIGURATION RECONCILIATION
// ============================================================================

fn live_gas_parameters(chain: &FakeChain, holograph_id: u32, params: GasParameters) {
    chain.set_view(
        addr(DUMMY_LZ_MODULE_ADDR),
        &ILayerZeroModule::getGasParametersCall {
            chainId: holograph_id,
        },
        LzGasParameters::from(params).abi_encode(),
    );
}

/// Test that stale gas parameters are fixed in one bulk call
/// Why: Each setGasParameters call costs a transaction or a multisig signature
#[tokio::test]
async fn test_reconcile_gas_parameters() {
    let chain = FakeChain::new();
    chain.set_admin(addr(DUMMY_LZ_MODULE_ADDR), addr(DUMMY_DEPLOYER_ADDR));
    let stale = GasParameters {
        msg_base_gas: U256::from(1u64),
        ..GasParameters::default()
    };
    live_gas_parameters(&chain, 4294967294, stale);
    live_gas_parameters(&chain, 4294967293, network_gas_parameters("localhost2"));

    let config = build_test_config();
    let session = build_node_session(config.clone(), EnvFlags::default());
    let network = localhost();
    let approvals = RecordingApproval::new();
    let formatters = FormatterRegistry::with_defaults();
    let dispatcher = Dispatcher::new(&session, &network, &chain, &approvals, &formatters);

    let observed = read_gas_parameters(&chain, addr(DUMMY_LZ_MODULE_ADDR), &config.networks, &network)
        .await
        .unwrap();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[0].live, stale);

    let (update, handle) = reconcile_gas_parameters(&dispatcher, &config.networks, addr(DUMMY_LZ_MODULE_ADDR))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(update.chain_ids, vec![4294967294, 0]);
    assert!(handle.is_broadcast());
    let sent = chain.node_sent();
    assert_eq!(sent.len(), 1);
    let call = ILayerZeroModule::setGasParametersCall::abi_decode(&sent[0].data, true).unwrap();
    assert_eq!(call.chainIds, vec![4294967294, 0]);
    assert_eq!(
        GasParameters::from(call.gasParameters[0].clone()),
        network_gas_parameters("localhost")
    );
}

/// Test that matching gas parameters produce no transaction
/// Why: Reconciliation must be idempotent
#[tokio::test]
async fn test_reconcile_gas_parameters_in_sync() {
    let chain = FakeChain::new();
    live_gas_parameters(&chain, 4294967294, network_gas_parameters("localhost"));
    live_gas_parameters(&chain, 4294967293, network_gas_parameters("localhost2"));

    let config = build_test_config();
    let session = build_node_session(config.clone(), EnvFlags::default());
    let network = localhost();
    let approvals = RecordingApproval::new();
    let formatters = FormatterRegistry::with_defaults();
    let dispatcher = Dispatcher::new(&session, &network, &chain, &approvals, &formatters);

    let result = reconcile_gas_parameters(&dispatcher, &config.networks, addr(DUMMY_LZ_MODULE_ADDR))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(chain.sent_count(), 0);
}

/// Test that the operator is pointed at the messaging module only when it differs
/// Why: Setting an identical module would waste a transaction
#[tokio::test]
async fn test_ensure_messaging_module() {
    let chain = FakeChain::new();
    chain.set_admin(addr(DUMMY_OPERATOR_ADDR), addr(DUMMY_DEPLOYER_ADDR));
    chain.set_selector_view::<IHolographOperator::getMessagingModuleCall>(
        addr(DUMMY_OPERATOR_ADDR),
        addr(DUMMY_LZ_MODULE_ADDR).abi_encode(),
    );
    let session = build_node_session(build_test_config(), EnvFlags::default());
    let network = localhost();
    let approvals = RecordingApproval::new();
    let formatters = FormatterRegistry::with_defaults();
    let dispatcher = Dispatcher::new(&session, &network, &chain, &approvals, &formatters);

    let unchanged = ensure_messaging_module(&dispatcher, addr(DUMMY_OPERATOR_ADDR), addr(DUMMY_LZ_MODULE_ADDR))
        .await
        .unwrap();
    assert!(unchanged.is_none());
    assert_eq!(chain.sent_count(), 0);

    let new_module = addr(DUMMY_TARGET_ADDR);
    let handle = ensure_messaging_module(&dispatcher, addr(DUMMY_OPERATOR_ADDR), new_module)
        .await
        .unwrap()
        .unwrap();
    assert!(handle.is_broadcast());
    let call =
        IHolographOperator::setMessagingModuleCall::abi_decode(&chain.node_sent()[0].data, true)
            .unwrap();
    assert_eq!(call.messagingModule, new_module);
}

/// Test that the gas price oracle is deployed and registered on the messaging module
/// Why: The module prices Optimism messages through this oracle
#[tokio::test]
async fn test_ensure_optimism_gas_price_oracle_deploys_and_registers() {
    let chain = FakeChain::new();
    chain.set_code(addr(DUMMY_GENESIS_ADDR));
    chain.set_admin(addr(DUMMY_LZ_MODULE_ADDR), addr(DUMMY_DEPLOYER_ADDR));
    chain.set_selector_view::<ILayerZeroModule::getOptimismGasPriceOracleCall>(
        addr(DUMMY_LZ_MODULE_ADDR),
        Address::ZERO.abi_encode(),
    );
    let oracle = genesis().future_address(B256::ZERO, &bytecode());
    chain.deploy_on_next_send(oracle);
    let session = build_node_session(build_test_config(), EnvFlags::default());
    let network = localhost();
    let approvals = RecordingApproval::new();
    let formatters = FormatterRegistry::with_defaults();
    let dispatcher = Dispatcher::new(&session, &network, &chain, &approvals, &formatters);
    let params = OvmGasPriceOracleParams::default();

    let (outcome, handle) = ensure_optimism_gas_price_oracle(
        &dispatcher,
        &genesis(),
        B256::ZERO,
        &bytecode(),
        &params,
        addr(DUMMY_LZ_MODULE_ADDR),
    )
    .await
    .unwrap();

    assert_eq!(outcome, DeployOutcome::Deployed(oracle));
    assert!(handle.unwrap().is_broadcast());

    let sent = chain.node_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, Some(addr(DUMMY_GENESIS_ADDR)));
    assert_eq!(
        sent[0].data,
        generate_deploy_code(1338, B256::ZERO, genesis().secret, &bytecode(), &params.init_code())
    );
    assert_eq!(sent[1].to, Some(addr(DUMMY_LZ_MODULE_ADDR)));
    let call =
        ILayerZeroModule::setOptimismGasPriceOracleCall::abi_decode(&sent[1].data, true).unwrap();
    assert_eq!(call.optimismGasPriceOracle, oracle);
}

/// Test that a deployed and registered oracle is left alone
/// Why: Repeated deploy runs must not send anything when nothing changed
#[tokio::test]
async fn test_ensure_optimism_gas_price_oracle_in_sync() {
    let chain = FakeChain::new();
    chain.set_code(addr(DUMMY_GENESIS_ADDR));
    let oracle = genesis().future_address(B256::ZERO, &bytecode());
    chain.set_code(oracle);
    chain.set_selector_view::<ILayerZeroModule::getOptimismGasPriceOracleCall>(
        addr(DUMMY_LZ_MODULE_ADDR),
        oracle.abi_encode(),
    );
    let session = build_node_session(build_test_config(), EnvFlags::default());
    let network = localhost();
    let approvals = RecordingApproval::new();
    let formatters = FormatterRegistry::with_defaults();
    let dispatcher = Dispatcher::new(&session, &network, &chain, &approvals, &formatters);

    let (outcome, handle) = ensure_optimism_gas_price_oracle(
        &dispatcher,
        &genesis(),
        B256::ZERO,
        &bytecode(),
        &OvmGasPriceOracleParams::default(),
        addr(DUMMY_LZ_MODULE_ADDR),
    )
    .await
    .unwrap();

    assert_eq!(outcome, DeployOutcome::Reused(oracle));
    assert!(handle.is_none());
    assert_eq!(chain.sent_count(), 0);
}

/// Test the oracle constructor values
/// Why: The messaging module divides by the scalar, so the values share one fixed point
#[test]
fn test_ovm_gas_price_oracle_params() {
    let params = OvmGasPriceOracleParams::default();
    type OracleInit = (U256, U256, U256, U256, U256);
    let decoded = OracleInit::abi_decode_params(&params.init_code(), true).unwrap();
    assert_eq!(
        decoded,
        (
            U256::from(1_000_000u64),
            U256::from(100_000_000_000u64),
            U256::from(2_100u64),
            U256::from(1_000_000u64),
            U256::from(6u64),
        )
    );
}

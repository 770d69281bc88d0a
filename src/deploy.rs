//! Idempotent deploy steps: check on-chain state, act only on a difference.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use tracing::{info, warn};

use crate::abi::{
    ovm_gas_price_oracle_init_code, IHolographFactory, IHolographOperator, IHolographRegistry,
    ILayerZeroModule, LzGasParameters, Verification,
};
use crate::address::{plan_genesis_deployment, Genesis};
use crate::config::NetworkConfig;
use crate::config_builder::BuiltConfig;
use crate::dispatcher::{Dispatcher, TransactionHandle};
use crate::error::{DeployError, Result};
use crate::gas::{
    plan_gas_parameter_updates, GasParameterUpdate, GasParameters, ObservedGasParameters, GWEI,
};
use crate::networks::peers_of;
use crate::provider::{call_view, is_deployed, wait_for_receipt, ChainProvider};
use crate::session::{DeploymentSession, TransactionSigner};

/// Result of a deploy step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed(Address),
    /// Code was already present
    Reused(Address),
    /// `DRY_RUN=true`; the address the contract would get, if known
    DryRun(Option<Address>),
}

impl DeployOutcome {
    pub fn address(&self) -> Option<Address> {
        match self {
            DeployOutcome::Deployed(a) | DeployOutcome::Reused(a) => Some(*a),
            DeployOutcome::DryRun(a) => *a,
        }
    }
}

// ============================================================================
// GENESIS DEPLOYMENTS
// ============================================================================

/// Deploys `name` through genesis unless its future address already holds
/// code.
#[allow(clippy::too_many_arguments)]
pub async fn genesis_deploy(
    session: &DeploymentSession,
    network: &NetworkConfig,
    provider: &dyn ChainProvider,
    genesis: &Genesis,
    name: &str,
    salt: B256,
    bytecode: &Bytes,
    init_code: &Bytes,
) -> Result<DeployOutcome> {
    let plan = plan_genesis_deployment(provider, genesis, network, salt, bytecode, init_code).await?;
    info!("future \"{}\" address is {}", name, plan.address);

    if is_deployed(provider, plan.address).await? {
        info!("reusing \"{}\" at {}", name, plan.address);
        return Ok(DeployOutcome::Reused(plan.address));
    }

    if session.flags().dry_run {
        info!("DRY_RUN: not deploying {} on {}", name, network.key);
        return Ok(DeployOutcome::DryRun(Some(plan.address)));
    }

    let hash = session
        .send_transaction(
            network,
            provider,
            Some(genesis.address),
            plan.deploy_code,
            U256::ZERO,
        )
        .await?;
    wait_for_receipt(provider, hash, session.polling()).await?;

    if !is_deployed(provider, plan.address).await? {
        return Err(anyhow::anyhow!(
            "{} deployment in {} left no code at {}",
            name,
            hash,
            plan.address
        )
        .into());
    }
    info!("Deployed {} at {} on {}", name, plan.address, network.key);
    Ok(DeployOutcome::Deployed(plan.address))
}

// ============================================================================
// HOLOGRAPHABLE CONTRACTS
// ============================================================================

/// Signs the config hash and has the factory deploy the contract. Returns
/// the address from `BridgeableContractDeployed`. A config the registry
/// already knows is reused.
pub async fn deploy_holographable(
    session: &DeploymentSession,
    network: &NetworkConfig,
    provider: &dyn ChainProvider,
    built: &BuiltConfig,
) -> Result<DeployOutcome> {
    let contracts = &session.config().contracts;
    let factory = contracts
        .factory
        .ok_or(DeployError::MissingContract("HolographFactory"))?;

    if let Some(registry) = contracts.registry {
        let call = IHolographRegistry::getHolographedHashAddressCall {
            hash: built.config_hash,
        };
        let existing = call_view(provider, registry, &call).await?._0;
        if existing != Address::ZERO {
            info!("Config {} already deployed at {}", built.config_hash, existing);
            return Ok(DeployOutcome::Reused(existing));
        }
    }

    let key = match session.signer() {
        TransactionSigner::Local(key) => key,
        TransactionSigner::Node(_) => {
            return Err(DeployError::InvalidInput(
                "signing a deployment config needs the local deployer key".to_string(),
            ))
        }
    };
    let signature = key.sign_message(built.config_hash)?;

    if session.flags().dry_run {
        info!("DRY_RUN: not deploying config {} on {}", built.config_hash, network.key);
        return Ok(DeployOutcome::DryRun(None));
    }

    let call = IHolographFactory::deployHolographableContractCall {
        config: built.config.to_abi(),
        signature: Verification {
            r: signature.r,
            s: signature.s,
            v: signature.v,
        },
        signer: key.address(),
    };
    let hash = session
        .send_transaction(
            network,
            provider,
            Some(factory),
            Bytes::from(call.abi_encode()),
            U256::ZERO,
        )
        .await?;
    let receipt = wait_for_receipt(provider, hash, session.polling()).await?;

    receipt
        .decode_logs::<IHolographFactory::BridgeableContractDeployed>()
        .into_iter()
        .find(|e| e.hash == built.config_hash)
        .map(|e| {
            info!("Deployed holographable {} on {}", e.contractAddress, network.key);
            DeployOutcome::Deployed(e.contractAddress)
        })
        .ok_or_else(|| {
            anyhow::anyhow!(
                "transaction {} did not emit BridgeableContractDeployed for {}",
                hash,
                built.config_hash
            )
            .into()
        })
}

// ============================================================================
// CONFIGURATION RECONCILIATION
// ============================================================================

/// Live gas parameters the messaging module holds for every active network
/// of the current network's class.
pub async fn read_gas_parameters<'n>(
    provider: &dyn ChainProvider,
    module: Address,
    networks: &'n [NetworkConfig],
    current: &NetworkConfig,
) -> Result<Vec<ObservedGasParameters<'n>>> {
    let mut observed = Vec::new();
    for network in peers_of(networks, current) {
        let call = ILayerZeroModule::getGasParametersCall {
            chainId: network.holograph_id,
        };
        let live: GasParameters = call_view(provider, module, &call).await?._0.into();
        observed.push(ObservedGasParameters { network, live });
    }
    Ok(observed)
}

/// Sends one `setGasParameters` covering every network whose live values
/// differ from the desired table. `None` when nothing differs.
pub async fn reconcile_gas_parameters(
    dispatcher: &Dispatcher<'_>,
    networks: &[NetworkConfig],
    module: Address,
) -> Result<Option<(GasParameterUpdate, TransactionHandle)>> {
    let current = dispatcher.network();
    let observed = read_gas_parameters(dispatcher.provider(), module, networks, current).await?;
    let update = plan_gas_parameter_updates(current, &observed);
    if update.is_empty() {
        info!("Messaging gas parameters on {} are up to date", current.key);
        return Ok(None);
    }

    let call = ILayerZeroModule::setGasParametersCall {
        chainIds: update.chain_ids.clone(),
        gasParameters: update
            .parameters
            .iter()
            .copied()
            .map(LzGasParameters::from)
            .collect(),
    };
    let handle = dispatcher
        .dispatch(
            "LayerZeroModule",
            module,
            Bytes::from(call.abi_encode()),
            U256::ZERO,
        )
        .await?;
    Ok(Some((update, handle)))
}

/// Points the operator at `module` if it uses anything else.
pub async fn ensure_messaging_module(
    dispatcher: &Dispatcher<'_>,
    operator: Address,
    module: Address,
) -> Result<Option<TransactionHandle>> {
    let current = call_view(
        dispatcher.provider(),
        operator,
        &IHolographOperator::getMessagingModuleCall {},
    )
    .await?
    ._0;
    if current == module {
        info!("HolographOperator already uses messaging module {}", module);
        return Ok(None);
    }

    warn!(
        "HolographOperator messaging module is {}, expected {}",
        current, module
    );
    let call = IHolographOperator::setMessagingModuleCall {
        messagingModule: module,
    };
    dispatcher
        .dispatch(
            "HolographOperator",
            operator,
            Bytes::from(call.abi_encode()),
            U256::ZERO,
        )
        .await
        .map(Some)
}

// ============================================================================
// OPTIMISM GAS PRICE ORACLE
// ============================================================================

pub const OVM_GAS_PRICE_ORACLE: &str = "OVM_GasPriceOracle";

/// Constructor values of the `OVM_GasPriceOracle` the messaging module
/// prices Optimism messages with. `scalar` and `decimals` express the
/// 6-decimal fixed point the other values are scaled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvmGasPriceOracleParams {
    pub gas_price: U256,
    pub l1_base_fee: U256,
    pub overhead: U256,
    pub scalar: U256,
    pub decimals: U256,
}

impl Default for OvmGasPriceOracleParams {
    fn default() -> Self {
        Self {
            // 1 wei at 6 decimals
            gas_price: U256::from(1_000_000u64),
            l1_base_fee: U256::from(100u64) * GWEI,
            overhead: U256::from(2_100u64),
            scalar: U256::from(1_000_000u64),
            decimals: U256::from(6u64),
        }
    }
}

impl OvmGasPriceOracleParams {
    pub fn init_code(&self) -> Bytes {
        ovm_gas_price_oracle_init_code(
            self.gas_price,
            self.l1_base_fee,
            self.overhead,
            self.scalar,
            self.decimals,
        )
    }
}

/// Deploys the gas price oracle through genesis if needed and points the
/// messaging module at it if it uses anything else.
pub async fn ensure_optimism_gas_price_oracle(
    dispatcher: &Dispatcher<'_>,
    genesis: &Genesis,
    salt: B256,
    bytecode: &Bytes,
    params: &OvmGasPriceOracleParams,
    module: Address,
) -> Result<(DeployOutcome, Option<TransactionHandle>)> {
    let outcome = genesis_deploy(
        dispatcher.session(),
        dispatcher.network(),
        dispatcher.provider(),
        genesis,
        OVM_GAS_PRICE_ORACLE,
        salt,
        bytecode,
        &params.init_code(),
    )
    .await?;
    let oracle = outcome
        .address()
        .ok_or(DeployError::MissingContract(OVM_GAS_PRICE_ORACLE))?;

    let current = call_view(
        dispatcher.provider(),
        module,
        &ILayerZeroModule::getOptimismGasPriceOracleCall {},
    )
    .await?
    ._0;
    if current == oracle {
        info!("LayerZeroModule already uses OptimismGasPriceOracle {}", oracle);
        return Ok((outcome, None));
    }

    warn!(
        "LayerZeroModule OptimismGasPriceOracle is {}, expected {}",
        current, oracle
    );
    let call = ILayerZeroModule::setOptimismGasPriceOracleCall {
        optimismGasPriceOracle: oracle,
    };
    let handle = dispatcher
        .dispatch(
            "LayerZeroModule",
            module,
            Bytes::from(call.abi_encode()),
            U256::ZERO,
        )
        .await?;
    Ok((outcome, Some(handle)))
}

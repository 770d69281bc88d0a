//! Future-address derivation.
//!
//! Protocol contracts are deployed through the genesis contract with
//! CREATE2. The salt is the deployer secret followed by the low 12 bytes of
//! the caller's salt, so the address depends only on the genesis address,
//! the secret, the salt and the creation bytecode. Networks that share a
//! genesis address and a secret get the same address for the same contract.

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::abi::IHolographGenesis;
use crate::config::{Config, NetworkConfig};
use crate::crypto::{keccak256, load_deployer_secret};
use crate::error::{DeployError, Result};
use crate::networks::is_localhost;
use crate::provider::{is_deployed, ChainProvider};

pub const GENESIS: &str = "HolographGenesis";
pub const GENESIS_LOCAL: &str = "HolographGenesisLocal";

/// `keccak256(0xff ++ deployer ++ salt ++ init_code_hash)[12..]`
pub fn create2_address(deployer: Address, salt: B256, init_code_hash: B256) -> Address {
    deployer.create2(salt.0, init_code_hash.0)
}

/// Genesis salt: the 20-byte secret followed by the low 12 bytes of `salt`.
pub fn genesis_salt_hash(secret: FixedBytes<20>, salt: B256) -> B256 {
    let mut out = [0u8; 32];
    out[..20].copy_from_slice(secret.as_slice());
    out[20..].copy_from_slice(&salt[20..]);
    B256::from(out)
}

/// Calldata for `HolographGenesis.deploy(chainId, saltHash, secret, bytecode, initCode)`.
pub fn generate_deploy_code(
    chain_id: u64,
    salt: B256,
    secret: FixedBytes<20>,
    bytecode: &Bytes,
    init_code: &Bytes,
) -> Bytes {
    let call = IHolographGenesis::deployCall {
        chainId: U256::from(chain_id),
        saltHash: FixedBytes::<12>::from_slice(&salt[20..]),
        secret,
        sourceCode: bytecode.clone(),
        initCode: init_code.clone(),
    };
    Bytes::from(call.abi_encode())
}

/// The genesis contract a network deploys through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Genesis {
    pub name: &'static str,
    pub address: Address,
    pub secret: FixedBytes<20>,
}

impl Genesis {
    pub fn new(name: &'static str, address: Address, secret: FixedBytes<20>) -> Self {
        Self {
            name,
            address,
            secret,
        }
    }

    /// Genesis for `network`: `HolographGenesisLocal` and the localhost
    /// secret on local networks, `HolographGenesis` elsewhere.
    pub fn for_network<F>(config: &Config, network: &NetworkConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (name, address) = if is_localhost(&network.key) {
            (GENESIS_LOCAL, config.contracts.genesis_local)
        } else {
            (GENESIS, config.contracts.genesis)
        };
        let address = address.ok_or_else(|| DeployError::GenesisNotDeployed(name.to_string()))?;
        let secret = load_deployer_secret(&config.deployer, &network.key, lookup)?;
        Ok(Self::new(name, address, secret))
    }

    pub fn salt_hash(&self, salt: B256) -> B256 {
        genesis_salt_hash(self.secret, salt)
    }

    /// Address `bytecode` will occupy when deployed with `salt`.
    pub fn future_address(&self, salt: B256, bytecode: &Bytes) -> Address {
        create2_address(self.address, self.salt_hash(salt), keccak256(bytecode))
    }

    /// Fails unless the genesis contract has code on the provider's chain.
    pub async fn ensure_deployed(&self, provider: &dyn ChainProvider) -> Result<()> {
        if !is_deployed(provider, self.address).await? {
            return Err(DeployError::GenesisNotDeployed(self.name.to_string()));
        }
        Ok(())
    }
}

/// A contract ready to be deployed through genesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisDeployment {
    pub address: Address,
    pub salt_hash: B256,
    pub deploy_code: Bytes,
}

/// Address and deploy calldata for `bytecode` on `network`. The init code is
/// part of the calldata but not of the address.
pub async fn plan_genesis_deployment(
    provider: &dyn ChainProvider,
    genesis: &Genesis,
    network: &NetworkConfig,
    salt: B256,
    bytecode: &Bytes,
    init_code: &Bytes,
) -> Result<GenesisDeployment> {
    genesis.ensure_deployed(provider).await?;
    let address = genesis.future_address(salt, bytecode);
    debug!("Future address on {} is {}", network.key, address);
    Ok(GenesisDeployment {
        address,
        salt_hash: genesis.salt_hash(salt),
        deploy_code: generate_deploy_code(
            network.chain_id,
            salt,
            genesis.secret,
            bytecode,
            init_code,
        ),
    })
}

/// Address `bytecode` will occupy on `network` once deployed through genesis.
pub async fn derive_future_address(
    provider: &dyn ChainProvider,
    genesis: &Genesis,
    network: &NetworkConfig,
    salt: B256,
    bytecode: &Bytes,
    init_code: &Bytes,
) -> Result<Address> {
    plan_genesis_deployment(provider, genesis, network, salt, bytecode, init_code)
        .await
        .map(|d| d.address)
}

/// Address the factory gives the holographer of `config_hash`.
pub fn holographer_address(
    factory: Address,
    config_hash: B256,
    holographer_code_hash: B256,
) -> Address {
    create2_address(factory, config_hash, holographer_code_hash)
}

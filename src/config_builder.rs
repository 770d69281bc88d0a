//! Deterministic deployment configurations.
//!
//! A [`DeploymentConfig`] describes a holographable contract independently
//! of when or where it is built: the same inputs always produce the same
//! config hash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, Bytes, FixedBytes, B256};
use serde::Deserialize;
use tracing::debug;

use crate::abi::{self, HolographDeploymentConfig};
use crate::config::NetworkConfig;
use crate::crypto::keccak256;
use crate::error::{DeployError, Result};
use crate::networks::chain_type_bytes;

// ============================================================================
// ARTIFACTS
// ============================================================================

/// Source of compiled contract creation bytecode.
pub trait ArtifactSource {
    fn bytecode(&self, contract_name: &str) -> Result<Bytes>;
}

#[derive(Debug, Deserialize)]
struct HardhatArtifact {
    #[serde(rename = "contractName")]
    contract_name: String,
    bytecode: String,
}

/// Reads Hardhat artifacts (`<root>/**/<Name>.json`) from disk.
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    root: PathBuf,
}

impl FsArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find(&self, dir: &Path, file_name: &str) -> Option<PathBuf> {
        let entries = std::fs::read_dir(dir).ok()?;
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
            } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
                return Some(path);
            }
        }
        subdirs.sort();
        subdirs.iter().find_map(|d| self.find(d, file_name))
    }
}

impl ArtifactSource for FsArtifacts {
    fn bytecode(&self, contract_name: &str) -> Result<Bytes> {
        let not_found = |reason: String| DeployError::ArtifactNotFound {
            name: contract_name.to_string(),
            reason,
        };

        let file_name = format!("{}.json", contract_name);
        let path = self
            .find(&self.root, &file_name)
            .ok_or_else(|| not_found(format!("no {} under {}", file_name, self.root.display())))?;

        let content = std::fs::read_to_string(&path)
            .map_err(|e| not_found(format!("{}: {}", path.display(), e)))?;
        let artifact: HardhatArtifact = serde_json::from_str(&content)
            .map_err(|e| not_found(format!("{}: {}", path.display(), e)))?;

        if artifact.contract_name != contract_name {
            return Err(not_found(format!(
                "{} describes {}",
                path.display(),
                artifact.contract_name
            )));
        }

        let code = artifact.bytecode.strip_prefix("0x").unwrap_or(&artifact.bytecode);
        if code.is_empty() {
            return Err(not_found("artifact has no creation bytecode".to_string()));
        }
        let bytes = hex::decode(code).map_err(|e| not_found(format!("bad bytecode hex: {}", e)))?;
        debug!("Loaded {} bytes of bytecode for {}", bytes.len(), contract_name);
        Ok(Bytes::from(bytes))
    }
}

/// Artifacts held in memory, keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    bytecode: HashMap<String, Bytes>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, contract_name: &str, bytecode: Bytes) -> Self {
        self.bytecode.insert(contract_name.to_string(), bytecode);
        self
    }
}

impl ArtifactSource for InMemoryArtifacts {
    fn bytecode(&self, contract_name: &str) -> Result<Bytes> {
        self.bytecode
            .get(contract_name)
            .cloned()
            .ok_or_else(|| DeployError::ArtifactNotFound {
                name: contract_name.to_string(),
                reason: "not registered".to_string(),
            })
    }
}

// ============================================================================
// DEPLOYMENT CONFIG
// ============================================================================

/// Canonical descriptor of a holographable contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub contract_type: B256,
    pub chain_type: FixedBytes<4>,
    pub salt: B256,
    pub byte_code: Bytes,
    pub init_code: Bytes,
}

impl DeploymentConfig {
    /// `keccak256(contractType ‖ chainType ‖ salt ‖ keccak256(byteCode) ‖ keccak256(initCode) ‖ deployer)`
    pub fn config_hash(&self, deployer: Address) -> B256 {
        let mut packed = Vec::with_capacity(32 + 4 + 32 + 32 + 32 + 20);
        packed.extend_from_slice(self.contract_type.as_slice());
        packed.extend_from_slice(self.chain_type.as_slice());
        packed.extend_from_slice(self.salt.as_slice());
        packed.extend_from_slice(keccak256(&self.byte_code).as_slice());
        packed.extend_from_slice(keccak256(&self.init_code).as_slice());
        packed.extend_from_slice(deployer.as_slice());
        keccak256(packed)
    }

    /// The struct passed to `deployHolographableContract`.
    pub fn to_abi(&self) -> HolographDeploymentConfig {
        HolographDeploymentConfig {
            contractType: self.contract_type,
            chainType: u32::from_be_bytes(self.chain_type.0),
            salt: self.salt,
            byteCode: self.byte_code.clone(),
            initCode: self.init_code.clone(),
        }
    }
}

/// A config together with its hash for a given deployer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltConfig {
    pub config: DeploymentConfig,
    pub config_hash: B256,
    /// The hash as raw bytes, ready for message signing
    pub config_hash_bytes: [u8; 32],
}

impl BuiltConfig {
    fn new(config: DeploymentConfig, deployer: Address) -> Self {
        let config_hash = config.config_hash(deployer);
        Self {
            config,
            config_hash,
            config_hash_bytes: config_hash.0,
        }
    }
}

/// Left-pads a hex salt to 32 bytes. An empty string is the zero salt.
pub fn pad_salt(salt: &str) -> Result<B256> {
    let trimmed = salt.strip_prefix("0x").unwrap_or(salt);
    if trimmed.len() > 64 {
        return Err(DeployError::InvalidInput(format!(
            "salt is longer than 32 bytes: {}",
            salt
        )));
    }
    let padded = format!("{:0>64}", trimmed);
    let bytes = hex::decode(&padded)
        .map_err(|e| DeployError::InvalidInput(format!("invalid salt hex '{}': {}", salt, e)))?;
    Ok(B256::from_slice(&bytes))
}

/// Inputs for an ERC20 holographable contract.
#[derive(Debug, Clone)]
pub struct Erc20ConfigParams<'a> {
    /// Custom contract wrapped by the enforcer
    pub contract_name: &'a str,
    pub token_name: &'a str,
    pub token_symbol: &'a str,
    pub domain_separator: &'a str,
    pub domain_version: &'a str,
    pub decimals: u8,
    pub event_config: B256,
    /// Initializer of the custom contract
    pub init_code: Bytes,
    pub salt: B256,
}

/// Inputs for an ERC721 holographable contract.
#[derive(Debug, Clone)]
pub struct Erc721ConfigParams<'a> {
    pub contract_name: &'a str,
    pub collection_name: &'a str,
    pub collection_symbol: &'a str,
    pub royalty_bps: u16,
    pub event_config: B256,
    pub init_code: Bytes,
    pub salt: B256,
}

/// Builds the config for an ERC20 on `network`.
pub fn build_erc20_config(
    artifacts: &dyn ArtifactSource,
    network: &NetworkConfig,
    deployer: Address,
    params: &Erc20ConfigParams<'_>,
) -> Result<BuiltConfig> {
    let config = DeploymentConfig {
        contract_type: abi::contract_type_hash("HolographERC20")?,
        chain_type: chain_type_bytes(network.holograph_id),
        salt: params.salt,
        byte_code: artifacts.bytecode(params.contract_name)?,
        init_code: abi::erc20_init_code(
            params.token_name,
            params.token_symbol,
            params.decimals,
            params.event_config,
            params.domain_separator,
            params.domain_version,
            false,
            &params.init_code,
        ),
    };
    Ok(BuiltConfig::new(config, deployer))
}

/// Builds the config for an ERC721 on `network`.
pub fn build_erc721_config(
    artifacts: &dyn ArtifactSource,
    network: &NetworkConfig,
    deployer: Address,
    params: &Erc721ConfigParams<'_>,
) -> Result<BuiltConfig> {
    let config = DeploymentConfig {
        contract_type: abi::contract_type_hash("HolographERC721")?,
        chain_type: chain_type_bytes(network.holograph_id),
        salt: params.salt,
        byte_code: artifacts.bytecode(params.contract_name)?,
        init_code: abi::erc721_init_code(
            params.collection_name,
            params.collection_symbol,
            params.royalty_bps,
            params.event_config,
            false,
            &params.init_code,
        ),
    };
    Ok(BuiltConfig::new(config, deployer))
}

//! Configuration Management Module
//!
//! Loads the deployer configuration: target networks, the protocol contract
//! addresses shared by every network, gas multipliers and the names of the
//! environment variables holding deployer secrets. Process-wide flags
//! (`DRY_RUN`, `GAS_PRICE_OVERRIDE`, ...) are read separately into [`EnvFlags`].

use std::collections::HashSet;

use alloy_primitives::{utils::parse_units, Address, U256};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deployer key and secret settings
    #[serde(default)]
    pub deployer: DeployerConfig,
    /// Gas pricing and receipt polling settings
    #[serde(default)]
    pub gas: GasConfig,
    /// Protocol contract addresses (identical on every network)
    #[serde(default)]
    pub contracts: ContractsConfig,
    /// All known networks
    pub networks: Vec<NetworkConfig>,
}

/// Deployer account configuration.
///
/// Keys are loaded from environment variables at runtime. The config file
/// contains the environment variable names, not the actual keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// Environment variable holding the deployer's secp256k1 private key (hex)
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    /// Environment variable holding the deployer secret for public networks
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    /// Environment variable holding the deployer secret for localhost networks
    #[serde(default = "default_localhost_secret_env")]
    pub localhost_secret_env: String,
    /// Account the node (or an attached hardware wallet) signs for when
    /// `HARDWARE_WALLET_ENABLED=true`
    #[serde(default)]
    pub hardware_wallet_address: Option<Address>,
    /// Directory of compiled Hardhat artifacts
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
}

fn default_private_key_env() -> String {
    "DEPLOYER_PRIVATE_KEY".to_string()
}

fn default_secret_env() -> String {
    "DEPLOYER_SECRET".to_string()
}

fn default_localhost_secret_env() -> String {
    "LOCALHOST_DEPLOYER_SECRET".to_string()
}

fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
            secret_env: default_secret_env(),
            localhost_secret_env: default_localhost_secret_env(),
            hardware_wallet_address: None,
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

impl DeployerConfig {
    /// Loads the deployer private key from the environment variable.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The private key (hex encoded)
    /// * `Err(anyhow::Error)` - Failed to load from environment
    pub fn get_private_key(&self) -> anyhow::Result<String> {
        std::env::var(&self.private_key_env).map_err(|_| {
            anyhow::anyhow!(
                "Environment variable '{}' not set. Please set it with the deployer's secp256k1 private key (hex encoded).",
                self.private_key_env
            )
        })
    }

    /// Name of the secret variable used for the given network.
    pub fn secret_env_for(&self, network_key: &str) -> &str {
        if crate::networks::is_localhost(network_key) {
            &self.localhost_secret_env
        } else {
            &self.secret_env
        }
    }
}

/// Gas pricing configuration. Multipliers are expressed in basis points
/// (10000 = 1x).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    #[serde(default = "default_multiplier")]
    pub gas_price_multiplier: u64,
    #[serde(default = "default_multiplier")]
    pub gas_limit_multiplier: u64,
    /// Refuse to price transactions above this many gwei; wait for a cheaper block instead
    #[serde(default)]
    pub max_gas_price_gwei: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub receipt_max_attempts: u32,
}

fn default_multiplier() -> u64 {
    10000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    300
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_price_multiplier: default_multiplier(),
            gas_limit_multiplier: default_multiplier(),
            max_gas_price_gwei: None,
            receipt_poll_interval_ms: default_poll_interval_ms(),
            receipt_max_attempts: default_max_attempts(),
        }
    }
}

/// Addresses of the protocol contracts. These are derived deterministically
/// and therefore the same on every network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub genesis: Option<Address>,
    #[serde(default)]
    pub genesis_local: Option<Address>,
    #[serde(default)]
    pub holograph: Option<Address>,
    #[serde(default)]
    pub factory: Option<Address>,
    #[serde(default)]
    pub registry: Option<Address>,
    #[serde(default)]
    pub bridge: Option<Address>,
    #[serde(default)]
    pub operator: Option<Address>,
    #[serde(default)]
    pub interfaces: Option<Address>,
    #[serde(default)]
    pub layer_zero_module: Option<Address>,
}

/// Network class, used to keep mainnet and testnet gas tables apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    #[default]
    Local,
}

/// A single EVM network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network key (e.g. "ethereum", "localhost2")
    pub key: String,
    /// Human-readable name
    pub name: String,
    /// EVM chain id
    pub chain_id: u64,
    /// Protocol-internal chain id
    pub holograph_id: u32,
    pub rpc_url: String,
    #[serde(default, rename = "type")]
    pub network_type: NetworkType,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Multisig that administers the protocol on this network
    #[serde(default)]
    pub protocol_multisig: Option<Address>,
}

fn default_active() -> bool {
    true
}

// ============================================================================
// PROCESS FLAGS
// ============================================================================

/// Flags read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFlags {
    /// `SKIP_DEPLOY_CONFIRMATION`: do not pause on prompts
    pub skip_deploy_confirmation: bool,
    /// `DRY_RUN`: report transactions but never broadcast them
    pub dry_run: bool,
    /// `GAS_PRICE_OVERRIDE`: fixed gas price, given in gwei, stored in wei
    pub gas_price_override: Option<U256>,
    /// `HARDWARE_WALLET_ENABLED`: let the node sign transactions
    pub hardware_wallet_enabled: bool,
    /// `DEBUG`: verbose logging
    pub debug: bool,
}

impl EnvFlags {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the flags from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| {
            lookup(name)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        let gas_price_override = match lookup("GAS_PRICE_OVERRIDE") {
            Some(raw) if !raw.trim().is_empty() => {
                let wei = parse_units(raw.trim(), "gwei")
                    .map_err(|e| anyhow::anyhow!("Invalid GAS_PRICE_OVERRIDE '{}': {}", raw, e))?
                    .get_absolute();
                Some(wei)
            }
            _ => None,
        };

        Ok(Self {
            skip_deploy_confirmation: flag("SKIP_DEPLOY_CONFIRMATION"),
            dry_run: flag("DRY_RUN"),
            gas_price_override,
            hardware_wallet_enabled: flag("HARDWARE_WALLET_ENABLED"),
            debug: flag("DEBUG"),
        })
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the network list.
    ///
    /// Network keys and EVM chain ids must be unique, non-zero holograph ids
    /// must be unique, and every RPC URL must parse.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut keys = HashSet::new();
        let mut chain_ids = HashSet::new();
        let mut holograph_ids = HashSet::new();

        for network in &self.networks {
            if !keys.insert(network.key.as_str()) {
                return Err(anyhow::anyhow!(
                    "Configuration error: network key '{}' is defined more than once.",
                    network.key
                ));
            }
            if !chain_ids.insert(network.chain_id) {
                return Err(anyhow::anyhow!(
                    "Configuration error: networks share the same chain ID {}. Each network must have a unique chain ID.",
                    network.chain_id
                ));
            }
            if network.holograph_id != 0 && !holograph_ids.insert(network.holograph_id) {
                return Err(anyhow::anyhow!(
                    "Configuration error: networks share the same holograph ID {}.",
                    network.holograph_id
                ));
            }
            url::Url::parse(&network.rpc_url).map_err(|e| {
                anyhow::anyhow!(
                    "Configuration error: invalid rpc_url '{}' for network '{}': {}",
                    network.rpc_url,
                    network.key,
                    e
                )
            })?;
        }

        Ok(())
    }

    /// Loads configuration from the TOML file.
    ///
    /// The path comes from `HOLOGRAPH_DEPLOYER_CONFIG_PATH`, falling back to
    /// `config/holograph-deployer.toml`. A missing file is an error that
    /// points the operator at the template.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("HOLOGRAPH_DEPLOYER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/holograph-deployer.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/holograph-deployer.template.toml config/holograph-deployer.toml\n\
                Then edit config/holograph-deployer.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Looks up a network by key.
    pub fn network(&self, key: &str) -> crate::Result<&NetworkConfig> {
        self.networks
            .iter()
            .find(|n| n.key == key)
            .ok_or_else(|| crate::DeployError::UnknownNetwork(key.to_string()))
    }
}

//! Holograph Deployment & Messaging Coordinator
//!
//! Off-chain orchestration for the Holograph protocol contracts: deterministic
//! deployment configs and addresses, gas and fee estimation for cross-chain
//! jobs, a multisig-aware transaction dispatcher and a relay simulator for
//! local two-chain setups.

pub mod abi;
pub mod address;
pub mod config;
pub mod config_builder;
pub mod contracts;
pub mod crypto;
pub mod deploy;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod evm_client;
pub mod gas;
pub mod networks;
pub mod provider;
pub mod relay;
pub mod session;

// Re-export commonly used types
pub use address::{derive_future_address, Genesis};
pub use config::{Config, EnvFlags, NetworkConfig};
pub use config_builder::{build_erc20_config, build_erc721_config, BuiltConfig, DeploymentConfig};
pub use crypto::{strict_ecdsa, DeployerKey, Signature};
pub use dispatcher::{Dispatcher, TransactionHandle};
pub use error::{DeployError, Result};
pub use evm_client::EvmClient;
pub use provider::ChainProvider;
pub use session::DeploymentSession;

//! Error types for the deployment coordinator.

use alloy_primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    // ---- missing collaborators ----
    #[error("We need to have {0} deployed.")]
    GenesisNotDeployed(String),

    #[error("Compiled artifact for {name} not found: {reason}")]
    ArtifactNotFound { name: String, reason: String },

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Secret is required")]
    MissingSecret,

    #[error("Contract address for {0} is not configured")]
    MissingContract(&'static str),

    // ---- authorization ----
    #[error("{0}")]
    NoAuthorizationPath(String),

    // ---- rpc ----
    #[error("JSON-RPC error from {url}: {message} (code: {code})")]
    Rpc {
        url: String,
        code: i64,
        message: String,
    },

    #[error("Transport error talking to {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    // ---- protocol ----
    #[error("HOLOGRAPH: invalid job {0}")]
    InvalidJob(B256),

    #[error("Transaction {0} reverted")]
    Reverted(B256),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("ABI decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeployError {
    /// True for failures produced by the node or the transport, which
    /// `skip_error` gas estimation is allowed to swallow.
    pub fn is_rpc(&self) -> bool {
        matches!(
            self,
            DeployError::Rpc { .. } | DeployError::Transport { .. } | DeployError::GasEstimation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

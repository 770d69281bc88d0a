//! Deployment session: configuration, signer and per-network nonces shared by
//! every step of a deploy run.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Config, EnvFlags, NetworkConfig};
use crate::crypto::transaction::UnsignedTransaction;
use crate::crypto::DeployerKey;
use crate::error::Result;
use crate::gas::{get_gas_limit, get_gas_price, GasPrice, GAS_LIMIT};
use crate::provider::{ChainProvider, NodeTransaction, ReceiptPolling};

/// Who signs the deployer's transactions.
#[derive(Debug, Clone)]
pub enum TransactionSigner {
    /// Signed in-process with the deployer key
    Local(DeployerKey),
    /// Signed by the node or an attached hardware wallet
    Node(Address),
}

impl TransactionSigner {
    pub fn address(&self) -> Address {
        match self {
            TransactionSigner::Local(key) => key.address(),
            TransactionSigner::Node(address) => *address,
        }
    }
}

/// Parameters of one outgoing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionParams {
    pub from: Address,
    pub value: U256,
    pub gas_limit: u64,
    pub nonce: u64,
    pub price: GasPrice,
}

impl TransactionParams {
    pub fn tx_type(&self) -> u8 {
        self.price.tx_type()
    }
}

/// State of one deploy run.
///
/// The nonce map is the only mutable state. One session must be the only
/// sender for its deployer on each network.
pub struct DeploymentSession {
    config: Config,
    flags: EnvFlags,
    signer: TransactionSigner,
    nonces: Mutex<HashMap<String, u64>>,
}

impl DeploymentSession {
    pub fn new(config: Config, flags: EnvFlags, signer: TransactionSigner) -> Self {
        Self {
            config,
            flags,
            signer,
            nonces: Mutex::new(HashMap::new()),
        }
    }

    /// Picks the signer from the flags: the configured hardware wallet
    /// account when `HARDWARE_WALLET_ENABLED=true`, the local key otherwise.
    pub fn from_config(config: Config, flags: EnvFlags) -> anyhow::Result<Self> {
        let signer = if flags.hardware_wallet_enabled {
            let address = config.deployer.hardware_wallet_address.ok_or_else(|| {
                anyhow::anyhow!(
                    "HARDWARE_WALLET_ENABLED is set but deployer.hardware_wallet_address is not configured"
                )
            })?;
            info!("Using node-managed signer {}", address);
            TransactionSigner::Node(address)
        } else {
            TransactionSigner::Local(DeployerKey::from_config(&config.deployer)?)
        };
        Ok(Self::new(config, flags, signer))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn flags(&self) -> &EnvFlags {
        &self.flags
    }

    pub fn signer(&self) -> &TransactionSigner {
        &self.signer
    }

    pub fn deployer(&self) -> Address {
        self.signer.address()
    }

    pub fn polling(&self) -> ReceiptPolling {
        ReceiptPolling::from(&self.config.gas)
    }

    // ------------------------------------------------------------------------
    // Nonces
    // ------------------------------------------------------------------------

    /// Returns the next nonce for `network` and advances the counter. The
    /// counter is seeded from the node on first use.
    pub async fn reserve_nonce(&self, network: &str, provider: &dyn ChainProvider) -> Result<u64> {
        let mut nonces = self.nonces.lock().await;
        let next = match nonces.get(network) {
            Some(n) => *n,
            None => provider.get_transaction_count(self.deployer()).await?,
        };
        nonces.insert(network.to_string(), next + 1);
        debug!("Reserved nonce {} on {}", next, network);
        Ok(next)
    }

    /// Gives back `nonce` if it is the latest reservation on `network`.
    /// Returns whether the counter moved.
    pub async fn release_nonce(&self, network: &str, nonce: u64) -> bool {
        let mut nonces = self.nonces.lock().await;
        match nonces.get_mut(network) {
            Some(next) if *next == nonce + 1 => {
                *next = nonce;
                debug!("Released nonce {} on {}", nonce, network);
                true
            }
            _ => false,
        }
    }

    /// The nonce the next transaction on `network` will use, if known.
    pub async fn next_nonce(&self, network: &str) -> Option<u64> {
        self.nonces.lock().await.get(network).copied()
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Builds the parameters for a transaction from the deployer. The nonce
    /// is reserved last, so estimation failures do not consume one.
    pub async fn tx_params(
        &self,
        network: &NetworkConfig,
        provider: &dyn ChainProvider,
        to: Option<Address>,
        data: &Bytes,
        value: U256,
        nonce: Option<u64>,
    ) -> Result<TransactionParams> {
        let from = self.deployer();
        let mut gas_limit = get_gas_limit(
            provider,
            from,
            to,
            data,
            value,
            true,
            self.config.gas.gas_limit_multiplier,
        )
        .await?;
        if gas_limit == 0 {
            warn!("Gas limit unknown on {}, falling back to {}", network.key, GAS_LIMIT);
            gas_limit = GAS_LIMIT;
        }

        let price = get_gas_price(provider, &self.flags, &self.config.gas).await?;
        let nonce = match nonce {
            Some(n) => n,
            None => self.reserve_nonce(&network.key, provider).await?,
        };

        Ok(TransactionParams {
            from,
            value,
            gas_limit,
            nonce,
            price,
        })
    }

    /// Signs and broadcasts a transaction. The nonce is handed back if the
    /// node rejects it.
    pub async fn send_transaction(
        &self,
        network: &NetworkConfig,
        provider: &dyn ChainProvider,
        to: Option<Address>,
        data: Bytes,
        value: U256,
    ) -> Result<B256> {
        let params = self
            .tx_params(network, provider, to, &data, value, None)
            .await?;

        let sent = match &self.signer {
            TransactionSigner::Local(key) => {
                let raw = UnsignedTransaction {
                    chain_id: network.chain_id,
                    nonce: params.nonce,
                    gas_limit: params.gas_limit,
                    to,
                    value,
                    data,
                    price: params.price,
                }
                .sign(key)?;
                provider.send_raw_transaction(&raw).await
            }
            TransactionSigner::Node(from) => {
                provider
                    .send_transaction(&NodeTransaction {
                        from: *from,
                        to,
                        data,
                        value,
                        gas_limit: Some(params.gas_limit),
                        nonce: Some(params.nonce),
                        price: Some(params.price),
                    })
                    .await
            }
        };

        match sent {
            Ok(hash) => {
                info!(
                    "Broadcast {} on {} (nonce {}, type {})",
                    hash,
                    network.key,
                    params.nonce,
                    params.tx_type()
                );
                Ok(hash)
            }
            Err(e) => {
                self.release_nonce(&network.key, params.nonce).await;
                Err(e)
            }
        }
    }
}

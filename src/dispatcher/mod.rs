//! Multisig-aware transaction dispatcher.
//!
//! Decides, per call, how a configuration transaction reaches its target:
//!
//! - the deployer administers the target: sign and broadcast
//! - Holograph administers the target and the deployer administers
//!   Holograph: broadcast `Holograph.adminCall(target, data)`
//! - the network's protocol multisig administers Holograph or the target:
//!   hand a decoded transaction to the [`ApprovalSink`]
//! - anything else is fatal
//!
//! Only broadcasts reserve a nonce, so after N dispatches of which M went to
//! the multisig the deployer nonce has advanced by exactly N - M.

pub mod approval;
pub mod formatters;

use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use tracing::{debug, error, info};

use crate::abi::{IAdmin, IOwner};
use crate::config::NetworkConfig;
use crate::error::{DeployError, Result};
use crate::provider::{call_view, wait_for_receipt, ChainProvider, Receipt, ReceiptPolling};
use crate::session::DeploymentSession;

pub use approval::{approval_for, ApprovalSink, AutoApproval, ConsoleApproval, RecordingApproval};
pub use formatters::{FormatContext, FormattedCall, FormatterRegistry};

// ============================================================================
// AUTHORITY
// ============================================================================

/// Account allowed to configure a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// `admin()` of the contract
    AdminOwned(Address),
    /// `owner()` of a contract whose admin is the factory
    OwnerOwned(Address),
}

impl Authority {
    pub fn holder(&self) -> Address {
        match self {
            Authority::AdminOwned(a) | Authority::OwnerOwned(a) => *a,
        }
    }
}

/// Reads `admin()` of `target`, switching to `owner()` when the admin is the
/// factory.
pub async fn resolve_authority(
    provider: &dyn ChainProvider,
    target: Address,
    factory: Option<Address>,
) -> Result<Authority> {
    let admin = call_view(provider, target, &IAdmin::adminCall {}).await?._0;
    if factory == Some(admin) {
        let owner = call_view(provider, target, &IOwner::ownerCall {}).await?._0;
        debug!("{} is factory administered, owner is {}", target, owner);
        return Ok(Authority::OwnerOwned(owner));
    }
    Ok(Authority::AdminOwned(admin))
}

// ============================================================================
// HANDLES
// ============================================================================

/// A transaction the protocol multisig has to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualTransaction {
    pub network: String,
    pub multisig: Address,
    pub label: String,
    /// Contract being configured
    pub target: Address,
    /// Address the multisig sends to
    pub to: Address,
    /// Set when the call is routed through `Holograph.adminCall`
    pub via_admin_call: Option<Address>,
    /// Decoded inner call
    pub call: FormattedCall,
    /// Calldata the multisig submits
    pub calldata: Bytes,
    pub value: U256,
}

impl fmt::Display for ManualTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(72))?;
        writeln!(f, "Manual multisig transaction required on {}", self.network)?;
        writeln!(f, "Multisig: {}", self.multisig)?;
        writeln!(f, "Contract: {} ({})", self.label, self.target)?;
        if let Some(holograph) = self.via_admin_call {
            writeln!(f, "Via: Holograph.adminCall on {}", holograph)?;
        }
        writeln!(f, "To: {}", self.to)?;
        if !self.value.is_zero() {
            writeln!(f, "Value: {}", self.value)?;
        }
        write!(f, "{}", self.call)?;
        writeln!(f, "Calldata: 0x{}", hex::encode(&self.calldata))?;
        write!(f, "{}", "=".repeat(72))
    }
}

/// What happened to a dispatched transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionHandle {
    Broadcast { hash: B256 },
    /// Handed to the multisig; nothing was sent from this process
    Manual,
    /// `DRY_RUN=true`; nothing was sent
    DryRun,
}

impl TransactionHandle {
    pub fn hash(&self) -> Option<B256> {
        match self {
            TransactionHandle::Broadcast { hash } => Some(*hash),
            _ => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, TransactionHandle::Broadcast { .. })
    }

    /// Waits for the receipt of a broadcast. Resolves to `None` immediately
    /// for manual and dry-run handles.
    pub async fn wait(
        &self,
        provider: &dyn ChainProvider,
        polling: ReceiptPolling,
    ) -> Result<Option<Receipt>> {
        match self {
            TransactionHandle::Broadcast { hash } => {
                wait_for_receipt(provider, *hash, polling).await.map(Some)
            }
            TransactionHandle::Manual | TransactionHandle::DryRun => Ok(None),
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct Dispatcher<'a> {
    session: &'a DeploymentSession,
    network: &'a NetworkConfig,
    provider: &'a dyn ChainProvider,
    approvals: &'a dyn ApprovalSink,
    formatters: &'a FormatterRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        session: &'a DeploymentSession,
        network: &'a NetworkConfig,
        provider: &'a dyn ChainProvider,
        approvals: &'a dyn ApprovalSink,
        formatters: &'a FormatterRegistry,
    ) -> Self {
        Self {
            session,
            network,
            provider,
            approvals,
            formatters,
        }
    }

    pub fn session(&self) -> &DeploymentSession {
        self.session
    }

    pub fn network(&self) -> &NetworkConfig {
        self.network
    }

    pub fn provider(&self) -> &dyn ChainProvider {
        self.provider
    }

    /// Sends `data` to `target` along whichever path is authorized.
    pub async fn dispatch(
        &self,
        label: &str,
        target: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TransactionHandle> {
        let deployer = self.session.deployer();
        let contracts = &self.session.config().contracts;
        let authority = resolve_authority(self.provider, target, contracts.factory).await?;
        let holder = authority.holder();
        debug!("{} ({}) is administered by {:?}", label, target, authority);

        if holder == deployer {
            return self.broadcast(label, target, data, value).await;
        }

        if contracts.holograph == Some(holder) {
            let holograph = holder;
            let holograph_admin = call_view(self.provider, holograph, &IAdmin::adminCall {})
                .await?
                ._0;

            if holograph_admin == deployer {
                info!("Routing {} call through Holograph.adminCall", label);
                let wrapped = IAdmin::adminCallCall {
                    target,
                    data: data.clone(),
                }
                .abi_encode();
                return self
                    .broadcast(label, holograph, Bytes::from(wrapped), value)
                    .await;
            }

            return match self.network.protocol_multisig {
                Some(multisig) if multisig == holograph_admin => {
                    self.manual(label, target, Some(holograph), multisig, data, value)
                        .await
                }
                Some(_) => self.no_path(
                    "Admin is Holograph, neither multisig nor deployer are admin of Holograph",
                ),
                None => self.no_path(
                    "No multisig available, admin is Holograph, deployer not admin of Holograph",
                ),
            };
        }

        match self.network.protocol_multisig {
            Some(multisig) if multisig == holder => {
                self.manual(label, target, None, multisig, data, value).await
            }
            Some(_) => {
                self.no_path("Neither deployer, multisig, nor Holograph are admin of this contract")
            }
            None => self.no_path(
                "No multisig available, neither deployer nor Holograph are admin of this contract",
            ),
        }
    }

    async fn broadcast(
        &self,
        label: &str,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TransactionHandle> {
        if self.session.flags().dry_run {
            let call = self.formatters.format(&data, &self.format_context());
            info!(
                "DRY_RUN: not sending {} to {} ({}) on {}",
                call.signature, label, to, self.network.key
            );
            return Ok(TransactionHandle::DryRun);
        }

        let hash = self
            .session
            .send_transaction(self.network, self.provider, Some(to), data, value)
            .await?;
        info!("Sent {} transaction {} on {}", label, hash, self.network.key);
        Ok(TransactionHandle::Broadcast { hash })
    }

    async fn manual(
        &self,
        label: &str,
        target: Address,
        via_admin_call: Option<Address>,
        multisig: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TransactionHandle> {
        let call = self.formatters.format(&data, &self.format_context());
        let (to, calldata) = match via_admin_call {
            Some(holograph) => {
                let wrapped = IAdmin::adminCallCall {
                    target,
                    data: data.clone(),
                }
                .abi_encode();
                (holograph, Bytes::from(wrapped))
            }
            None => (target, data),
        };

        let tx = ManualTransaction {
            network: self.network.key.clone(),
            multisig,
            label: label.to_string(),
            target,
            to,
            via_admin_call,
            call,
            calldata,
            value,
        };
        self.approvals.confirm(&tx).await?;
        info!("{} call on {} handed to multisig {}", label, self.network.key, multisig);
        Ok(TransactionHandle::Manual)
    }

    fn no_path(&self, message: &str) -> Result<TransactionHandle> {
        error!("{} (network {})", message, self.network.key);
        Err(DeployError::NoAuthorizationPath(message.to_string()))
    }

    fn format_context(&self) -> FormatContext<'_> {
        FormatContext {
            networks: &self.session.config().networks,
            current: self.network,
        }
    }
}

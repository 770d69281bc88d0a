//! Holograph Deployer
//!
//! Command line front end for the deployment coordinator.
//!
//! ## Usage
//!
//! ```bash
//! holograph-deployer --network localhost derive-address --contract Holograph --salt 0x
//! holograph-deployer --network localhost config-hash --standard erc20 --contract SampleERC20 \
//!     --name "Sample ERC20 Token" --symbol SMPL --domain-separator "Sample ERC20 Token"
//! holograph-deployer --network ethereum reconcile-gas
//! holograph-deployer --network localhost deployer-address
//! ```
//!
//! The config file comes from `HOLOGRAPH_DEPLOYER_CONFIG_PATH` or
//! `config/holograph-deployer.toml`.

use alloy_primitives::Bytes;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};

use holograph_deployer::address::{derive_future_address, Genesis};
use holograph_deployer::config::{Config, EnvFlags, NetworkConfig, NetworkType};
use holograph_deployer::config_builder::{
    build_erc20_config, build_erc721_config, pad_salt, ArtifactSource, Erc20ConfigParams,
    Erc721ConfigParams, FsArtifacts,
};
use holograph_deployer::deploy::reconcile_gas_parameters;
use holograph_deployer::dispatcher::{approval_for, Dispatcher, FormatterRegistry};
use holograph_deployer::events::{all_events_enabled, parse_event_config};
use holograph_deployer::evm_client::EvmClient;
use holograph_deployer::provider::verify_chain_id;
use holograph_deployer::session::DeploymentSession;

#[derive(Parser, Debug)]
#[command(name = "holograph-deployer")]
#[command(about = "Deterministic deployment and cross-chain configuration for Holograph contracts")]
struct Args {
    /// Network key from the config file
    #[arg(short, long)]
    network: String,

    /// Path to the config file (overrides HOLOGRAPH_DEPLOYER_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the address a contract will get when deployed through genesis
    DeriveAddress {
        #[arg(long)]
        contract: String,
        /// Hex salt, left-padded to 32 bytes
        #[arg(long, default_value = "0x")]
        salt: String,
        #[arg(long, default_value = "0x")]
        init_code: String,
    },
    /// Build a holographable deployment config and print its hash
    ConfigHash {
        #[arg(long, value_enum)]
        standard: Standard,
        #[arg(long)]
        contract: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 18)]
        decimals: u8,
        #[arg(long, default_value_t = 1000)]
        royalty_bps: u16,
        #[arg(long, default_value = "")]
        domain_separator: String,
        #[arg(long, default_value = "1")]
        domain_version: String,
        /// Enabled events; all events when omitted
        #[arg(long = "event")]
        events: Vec<String>,
        #[arg(long, default_value = "0x")]
        init_code: String,
        #[arg(long, default_value = "0x")]
        salt: String,
    },
    /// Bring the messaging module's gas parameters in line with the network table
    ReconcileGas,
    /// Print the deployer address
    DeployerAddress,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Standard {
    Erc20,
    Erc721,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let flags = EnvFlags::from_env()?;

    let level = if flags.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Some(path) = &args.config {
        std::env::set_var("HOLOGRAPH_DEPLOYER_CONFIG_PATH", path);
        info!("Using custom config: {}", path);
    }
    let config = Config::load()?;
    info!("Configuration loaded successfully");
    let network = config.network(&args.network)?.clone();
    info!(
        "Network: {} (chain ID: {}, holograph ID: {})",
        network.name, network.chain_id, network.holograph_id
    );

    match args.command {
        Command::DeriveAddress {
            contract,
            salt,
            init_code,
        } => {
            let provider = EvmClient::new(&network.rpc_url)?;
            verify_chain_id(&provider, network.chain_id).await?;
            let genesis = Genesis::for_network(&config, &network, |name| std::env::var(name).ok())?;
            let artifacts = FsArtifacts::new(&config.deployer.artifacts_dir);
            let bytecode = artifacts.bytecode(&contract)?;
            let address = derive_future_address(
                &provider,
                &genesis,
                &network,
                pad_salt(&salt)?,
                &bytecode,
                &parse_hex(&init_code)?,
            )
            .await?;
            println!("{}", address);
        }
        Command::ConfigHash {
            standard,
            contract,
            name,
            symbol,
            decimals,
            royalty_bps,
            domain_separator,
            domain_version,
            events,
            init_code,
            salt,
        } => {
            let session = DeploymentSession::from_config(config.clone(), flags)?;
            let artifacts = FsArtifacts::new(&config.deployer.artifacts_dir);
            let event_config = if events.is_empty() {
                all_events_enabled()
            } else {
                parse_event_config(&events)?
            };
            let init_code = parse_hex(&init_code)?;
            let salt = pad_salt(&salt)?;
            let built = match standard {
                Standard::Erc20 => build_erc20_config(
                    &artifacts,
                    &network,
                    session.deployer(),
                    &Erc20ConfigParams {
                        contract_name: &contract,
                        token_name: &name,
                        token_symbol: &symbol,
                        domain_separator: &domain_separator,
                        domain_version: &domain_version,
                        decimals,
                        event_config,
                        init_code: init_code.clone(),
                        salt,
                    },
                )?,
                Standard::Erc721 => build_erc721_config(
                    &artifacts,
                    &network,
                    session.deployer(),
                    &Erc721ConfigParams {
                        contract_name: &contract,
                        collection_name: &name,
                        collection_symbol: &symbol,
                        royalty_bps,
                        event_config,
                        init_code: init_code.clone(),
                        salt,
                    },
                )?,
            };
            println!("{}", built.config_hash);
        }
        Command::ReconcileGas => {
            let module = config
                .contracts
                .layer_zero_module
                .context("contracts.layer_zero_module is not configured")?;
            confirm_writes(&network, &flags).await?;

            let session = DeploymentSession::from_config(config.clone(), flags.clone())?;
            let provider = EvmClient::new(&network.rpc_url)?;
            verify_chain_id(&provider, network.chain_id).await?;
            let approvals = approval_for(flags.skip_deploy_confirmation);
            let formatters = FormatterRegistry::with_defaults();
            let dispatcher = Dispatcher::new(
                &session,
                &network,
                &provider,
                approvals.as_ref(),
                &formatters,
            );

            match reconcile_gas_parameters(&dispatcher, &config.networks, module).await? {
                Some((update, handle)) => {
                    info!("Updating gas parameters for chain ids {:?}", update.chain_ids);
                    if let Some(receipt) = handle.wait(&provider, session.polling()).await? {
                        info!("Gas parameters updated in block {:?}", receipt.block_number);
                    }
                }
                None => info!("Nothing to update"),
            }
        }
        Command::DeployerAddress => {
            let session = DeploymentSession::from_config(config.clone(), flags)?;
            println!("{}", session.deployer());
        }
    }

    Ok(())
}

fn parse_hex(value: &str) -> Result<Bytes> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).with_context(|| format!("Invalid hex '{}'", value))?;
    Ok(Bytes::from(bytes))
}

/// Pauses before writing to a mainnet unless confirmations are skipped.
async fn confirm_writes(network: &NetworkConfig, flags: &EnvFlags) -> Result<()> {
    if network.network_type != NetworkType::Mainnet || flags.skip_deploy_confirmation {
        return Ok(());
    }
    println!(
        "About to send transactions on {} ({}). Press enter to continue or Ctrl-C to abort.",
        network.name, network.key
    );
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read confirmation")?;
    Ok(())
}

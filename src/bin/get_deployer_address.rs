//! Get Deployer Address
//!
//! Reads the holograph-deployer configuration and prints the Ethereum address
//! of the key named by `deployer.private_key_env`. Deployment configs are
//! hashed with this address, so it must match on every network.

use anyhow::Result;
use holograph_deployer::config::Config;
use holograph_deployer::crypto::DeployerKey;

fn main() -> Result<()> {
    let config = Config::load()?;
    let key = DeployerKey::from_config(&config.deployer)?;
    println!("{}", key.address());
    Ok(())
}

//! Network lookups over the configured network list.

use alloy_primitives::FixedBytes;

use crate::config::NetworkConfig;

/// Local development networks use their own genesis contract and secret.
pub fn is_localhost(network_key: &str) -> bool {
    matches!(network_key, "localhost" | "localhost2")
}

/// 4-byte big-endian chain type used in deployment configs.
pub fn chain_type_bytes(holograph_id: u32) -> FixedBytes<4> {
    FixedBytes::from(holograph_id.to_be_bytes())
}

/// Finds the network with the given holograph id. Unknown ids (including the
/// `0` used for "this chain") resolve to `current`.
pub fn network_by_holograph_id<'a>(
    networks: &'a [NetworkConfig],
    current: &'a NetworkConfig,
    holograph_id: u32,
) -> &'a NetworkConfig {
    networks
        .iter()
        .find(|n| n.holograph_id == holograph_id && holograph_id != 0)
        .unwrap_or(current)
}

/// Active networks of the same class (mainnet/testnet/local) as `current`,
/// in configuration order.
pub fn peers_of<'a>(
    networks: &'a [NetworkConfig],
    current: &NetworkConfig,
) -> impl Iterator<Item = &'a NetworkConfig> {
    let network_type = current.network_type;
    networks
        .iter()
        .filter(move |n| n.active && n.network_type == network_type)
}

//! Contract bindings and initializer encoders.
//!
//! Only the functions and events this crate touches are declared.

use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::{sol, SolValue};

use crate::error::{DeployError, Result};

sol! {
    /// Per-destination messaging gas parameters held by the messaging module.
    #[derive(Debug, PartialEq, Eq)]
    struct LzGasParameters {
        uint256 msgBaseGas;
        uint256 msgGasPerByte;
        uint256 jobBaseGas;
        uint256 jobGasPerByte;
        uint256 minGasPrice;
        uint256 maxGasLimit;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct HolographDeploymentConfig {
        bytes32 contractType;
        uint32 chainType;
        bytes32 salt;
        bytes byteCode;
        bytes initCode;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Verification {
        bytes32 r;
        bytes32 s;
        uint8 v;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct OperatorJob {
        uint8 pod;
        uint16 blockTimes;
        address operator;
        uint40 startBlock;
        uint64 startTimestamp;
        uint16[5] fallbackOperators;
    }

    interface IAdmin {
        function admin() external view returns (address);
        function adminCall(address target, bytes calldata data) external payable;
    }

    interface IOwner {
        function owner() external view returns (address);
    }

    interface IHolographGenesis {
        function deploy(uint256 chainId, bytes12 saltHash, bytes20 secret, bytes memory sourceCode, bytes memory initCode) external;
    }

    interface IHolographFactory {
        function deployHolographableContract(HolographDeploymentConfig memory config, Verification memory signature, address signer) external;

        event BridgeableContractDeployed(address indexed contractAddress, bytes32 indexed hash);
    }

    interface IHolographRegistry {
        function getHolographedHashAddress(bytes32 hash) external view returns (address);
        function setReservedContractTypeAddresses(bytes32[] calldata hashes, bool[] calldata reserved) external;
        function setContractTypeAddress(bytes32 contractType, address contractAddress) external;
    }

    interface IHolographInterfaces {
        function updateChainIdMaps(uint8[] memory fromChainType, uint256[] memory fromChainId, uint8[] memory toChainType, uint256[] memory toChainId) external;
        function updateUriPrepends(uint8[] memory uriTypes, string[] memory prepends) external;
        function getChainId(uint8 fromChainType, uint256 fromChainId, uint8 toChainType) external view returns (uint256 toChainId);
    }

    interface IHolographBridge {
        function getBridgeOutRequestPayload(uint32 toChain, address holographableContract, uint256 gasLimit, uint256 gasPrice, bytes calldata bridgeOutPayload) external returns (bytes memory samplePayload);
        function getMessageFee(uint32 toChain, uint256 gasLimit, uint256 gasPrice, bytes calldata crossChainPayload) external view returns (uint256 hlgFee, uint256 msgFee, uint256 dstGasPrice);
        function bridgeOutRequest(uint32 toChain, address holographableContract, uint256 gasLimit, uint256 gasPrice, bytes calldata bridgeOutPayload) external payable;
    }

    interface IHolographOperator {
        function jobEstimator(bytes calldata bridgeInRequestPayload) external payable returns (uint256);
        function executeJob(bytes calldata bridgeInRequestPayload) external payable;
        function recoverJob(bytes calldata bridgeInRequestPayload) external payable;
        function getJobDetails(bytes32 jobHash) external view returns (OperatorJob memory);
        function getMessagingModule() external view returns (address);
        function setMessagingModule(address messagingModule) external;

        event AvailableOperatorJob(bytes32 jobHash, bytes payload);
        event FailedOperatorJob(bytes32 jobHash);
    }

    interface ILayerZeroModule {
        function getGasParameters(uint32 chainId) external view returns (LzGasParameters memory);
        function setGasParameters(uint32[] memory chainIds, LzGasParameters[] memory gasParameters) external;
        function setOptimismGasPriceOracle(address optimismGasPriceOracle) external;
        function getOptimismGasPriceOracle() external view returns (address);
        function lzReceive(uint16 srcChainId, bytes calldata srcAddress, uint64 nonce, bytes calldata payload) external;
    }

    interface IMockLZEndpoint {
        function crossChainMessage(address target, uint256 gasLimit, bytes calldata payload) external;
        function adminCall(address target, bytes calldata payload) external;

        event LzEvent(uint16 dstChainId, bytes destination, bytes payload);
    }
}

// ============================================================================
// ENCODING HELPERS
// ============================================================================

/// ASCII/UTF-8 name left-padded with zeros into a 32-byte slot
/// (e.g. the `contractType` of "HolographERC20").
pub fn utf8_to_bytes32(value: &str) -> Result<B256> {
    let bytes = value.as_bytes();
    if bytes.len() > 32 {
        return Err(DeployError::InvalidInput(format!(
            "'{}' does not fit in bytes32 ({} bytes)",
            value,
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(B256::from(out))
}

/// `contractType` of a registered contract name.
pub fn contract_type_hash(contract_name: &str) -> Result<B256> {
    utf8_to_bytes32(contract_name)
}

/// Inverse of [`utf8_to_bytes32`]: strips padding zeros and decodes what is
/// left. Non-UTF-8 content is returned as hex.
pub fn bytes32_to_utf8(value: &B256) -> String {
    let trimmed: Vec<u8> = value.iter().copied().filter(|b| *b != 0).collect();
    match String::from_utf8(trimmed) {
        Ok(s) => s,
        Err(_) => value.to_string(),
    }
}

/// Initializer for a `HolographERC20` enforcer wrapping a custom contract.
#[allow(clippy::too_many_arguments)]
pub fn erc20_init_code(
    token_name: &str,
    token_symbol: &str,
    decimals: u8,
    event_config: B256,
    domain_separator: &str,
    domain_version: &str,
    skip_init: bool,
    custom_init_code: &Bytes,
) -> Bytes {
    let encoded = (
        token_name.to_string(),
        token_symbol.to_string(),
        U256::from(decimals),
        U256::from_be_bytes(event_config.0),
        domain_separator.to_string(),
        domain_version.to_string(),
        skip_init,
        custom_init_code.clone(),
    )
        .abi_encode_params();
    Bytes::from(encoded)
}

/// Initializer for a `HolographERC721` enforcer wrapping a custom contract.
pub fn erc721_init_code(
    collection_name: &str,
    collection_symbol: &str,
    royalty_bps: u16,
    event_config: B256,
    skip_init: bool,
    custom_init_code: &Bytes,
) -> Bytes {
    let encoded = (
        collection_name.to_string(),
        collection_symbol.to_string(),
        U256::from(royalty_bps),
        U256::from_be_bytes(event_config.0),
        skip_init,
        custom_init_code.clone(),
    )
        .abi_encode_params();
    Bytes::from(encoded)
}

/// Initializer for `OVM_GasPriceOracle`.
pub fn ovm_gas_price_oracle_init_code(
    gas_price: U256,
    l1_base_fee: U256,
    overhead: U256,
    scalar: U256,
    decimals: U256,
) -> Bytes {
    Bytes::from((gas_price, l1_base_fee, overhead, scalar, decimals).abi_encode_params())
}

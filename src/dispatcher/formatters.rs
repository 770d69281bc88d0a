//! Human-readable decoding of calls that need manual multisig review.
//!
//! Formatters are registered per function selector. Calls without a
//! formatter (or whose calldata does not decode) fall back to printing each
//! 32-byte argument word as `decimal => hex`.

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::U256;
use alloy_sol_types::SolCall;

use crate::abi::{
    bytes32_to_utf8, IHolographInterfaces, IHolographOperator, IHolographRegistry,
    ILayerZeroModule,
};
use crate::config::NetworkConfig;
use crate::networks::network_by_holograph_id;

/// Networks available to formatters.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub networks: &'a [NetworkConfig],
    pub current: &'a NetworkConfig,
}

/// A decoded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedCall {
    pub signature: String,
    pub arguments: Vec<(String, String)>,
}

impl fmt::Display for FormattedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function: {}", self.signature)?;
        for (name, value) in &self.arguments {
            writeln!(f, "  {}: {}", name, value)?;
        }
        Ok(())
    }
}

type FormatFn = Box<dyn Fn(&[u8], &FormatContext<'_>) -> Option<Vec<(String, String)>> + Send + Sync>;

struct Formatter {
    signature: &'static str,
    format: FormatFn,
}

/// Formatters keyed by function selector.
#[derive(Default)]
pub struct FormatterRegistry {
    formatters: HashMap<[u8; 4], Formatter>,
}

/// `decimal => hex`
pub fn dec_hex(value: U256) -> String {
    format!("{} => 0x{:x}", value, value)
}

fn list<T, F: Fn(&T) -> String>(items: &[T], f: F) -> String {
    format!("[{}]", items.iter().map(f).collect::<Vec<_>>().join(", "))
}

/// Names of `ChainIdType` values.
pub fn chain_id_type_name(value: u8) -> String {
    match value {
        0 => "ChainIdType.UNDEFINED".to_string(),
        1 => "ChainIdType.EVM".to_string(),
        2 => "ChainIdType.HOLOGRAPH".to_string(),
        3 => "ChainIdType.LAYERZERO".to_string(),
        4 => "ChainIdType.HYPERLANE".to_string(),
        other => format!("ChainIdType.{}", other),
    }
}

/// Names of `TokenUriType` values.
pub fn token_uri_type_name(value: u8) -> String {
    match value {
        0 => "TokenUriType.UNDEFINED".to_string(),
        1 => "TokenUriType.IPFS".to_string(),
        2 => "TokenUriType.HTTPS".to_string(),
        3 => "TokenUriType.ARWEAVE".to_string(),
        other => format!("TokenUriType.{}", other),
    }
}

impl FormatterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a formatter for call `C`.
    pub fn register<C, F>(&mut self, format: F)
    where
        C: SolCall + 'static,
        F: Fn(C, &FormatContext<'_>) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        let decode_and_format: FormatFn = Box::new(move |data: &[u8], ctx: &FormatContext<'_>| {
            C::abi_decode(data, true).ok().map(|call| format(call, ctx))
        });
        self.formatters.insert(
            C::SELECTOR,
            Formatter {
                signature: C::SIGNATURE,
                format: decode_and_format,
            },
        );
    }

    pub fn contains(&self, selector: [u8; 4]) -> bool {
        self.formatters.contains_key(&selector)
    }

    /// Registry with every protocol configuration call.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register::<IHolographRegistry::setReservedContractTypeAddressesCall, _>(
            |call, _| {
                vec![
                    (
                        "hashes".to_string(),
                        list(&call.hashes, |h| bytes32_to_utf8(h)),
                    ),
                    (
                        "reserved".to_string(),
                        list(&call.reserved, |r| r.to_string()),
                    ),
                ]
            },
        );

        registry.register::<IHolographRegistry::setContractTypeAddressCall, _>(|call, _| {
            vec![
                ("contractType".to_string(), bytes32_to_utf8(&call.contractType)),
                ("contractAddress".to_string(), call.contractAddress.to_string()),
            ]
        });

        registry.register::<IHolographInterfaces::updateChainIdMapsCall, _>(|call, _| {
            vec![
                (
                    "fromChainType".to_string(),
                    list(&call.fromChainType, |t| chain_id_type_name(*t)),
                ),
                ("fromChainId".to_string(), list(&call.fromChainId, |v| dec_hex(*v))),
                (
                    "toChainType".to_string(),
                    list(&call.toChainType, |t| chain_id_type_name(*t)),
                ),
                ("toChainId".to_string(), list(&call.toChainId, |v| dec_hex(*v))),
            ]
        });

        registry.register::<IHolographInterfaces::updateUriPrependsCall, _>(|call, _| {
            vec![
                (
                    "uriTypes".to_string(),
                    list(&call.uriTypes, |t| token_uri_type_name(*t)),
                ),
                ("prepends".to_string(), list(&call.prepends, |p| p.clone())),
            ]
        });

        registry.register::<ILayerZeroModule::setGasParametersCall, _>(|call, ctx| {
            let chains = list(&call.chainIds, |id| {
                network_by_holograph_id(ctx.networks, ctx.current, *id)
                    .key
                    .clone()
            });
            let params = list(&call.gasParameters, |p| {
                let values = [
                    p.msgBaseGas,
                    p.msgGasPerByte,
                    p.jobBaseGas,
                    p.jobGasPerByte,
                    p.minGasPrice,
                    p.maxGasLimit,
                ];
                list(&values, |v| dec_hex(*v))
            });
            vec![
                ("chainIds".to_string(), chains),
                ("gasParameters".to_string(), params),
            ]
        });

        registry.register::<ILayerZeroModule::setOptimismGasPriceOracleCall, _>(|call, _| {
            vec![(
                "optimismGasPriceOracle".to_string(),
                call.optimismGasPriceOracle.to_string(),
            )]
        });

        registry.register::<IHolographOperator::setMessagingModuleCall, _>(|call, _| {
            vec![("messagingModule".to_string(), call.messagingModule.to_string())]
        });

        registry
    }

    /// Decodes `calldata` for display.
    pub fn format(&self, calldata: &[u8], ctx: &FormatContext<'_>) -> FormattedCall {
        if calldata.len() >= 4 {
            let mut selector = [0u8; 4];
            selector.copy_from_slice(&calldata[..4]);
            if let Some(formatter) = self.formatters.get(&selector) {
                if let Some(arguments) = (formatter.format)(calldata, ctx) {
                    return FormattedCall {
                        signature: formatter.signature.to_string(),
                        arguments,
                    };
                }
            }
        }
        raw_call(calldata)
    }
}

fn raw_call(calldata: &[u8]) -> FormattedCall {
    let (selector, args) = calldata.split_at(calldata.len().min(4));
    let arguments = args
        .chunks(32)
        .enumerate()
        .map(|(i, word)| {
            let mut padded = [0u8; 32];
            padded[..word.len()].copy_from_slice(word);
            (format!("arg{}", i), dec_hex(U256::from_be_bytes(padded)))
        })
        .collect();
    FormattedCall {
        signature: format!("0x{}", hex::encode(selector)),
        arguments,
    }
}

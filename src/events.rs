//! Event configuration bitmasks.
//!
//! Holographable contracts only invoke the lifecycle hooks whose bit is set in
//! their `eventConfig`. Bit `n` corresponds to the event with enum value `n`
//! (enum values start at 1), packed into a 256-bit big-endian word.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{B256, U256};

use crate::error::DeployError;

/// A hook that can be enabled in an event configuration.
pub trait EventKind: Copy {
    /// 1-indexed bit position.
    fn bit(self) -> u8;
}

macro_rules! event_enum {
    ($(#[$meta:meta])* $name:ident, $prefix:literal { $($variant:ident = $value:literal => $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl EventKind for $name {
            fn bit(self) -> u8 {
                self as u8
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}", $prefix, self.name())
            }
        }

        impl FromStr for $name {
            type Err = DeployError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let short = s.strip_prefix(concat!($prefix, ".")).unwrap_or(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|e| e.name() == short)
                    .ok_or_else(|| DeployError::InvalidInput(format!("Unknown event: {}", s)))
            }
        }
    };
}

event_enum!(
    /// Hooks of `HolographERC20`.
    Erc20Event, "HolographERC20Event" {
        BridgeIn = 1 => "bridgeIn",
        BridgeOut = 2 => "bridgeOut",
        AfterApprove = 3 => "afterApprove",
        BeforeApprove = 4 => "beforeApprove",
        AfterOnErc20Received = 5 => "afterOnERC20Received",
        BeforeOnErc20Received = 6 => "beforeOnERC20Received",
        AfterBurn = 7 => "afterBurn",
        BeforeBurn = 8 => "beforeBurn",
        AfterMint = 9 => "afterMint",
        BeforeMint = 10 => "beforeMint",
        AfterSafeTransfer = 11 => "afterSafeTransfer",
        BeforeSafeTransfer = 12 => "beforeSafeTransfer",
        AfterTransfer = 13 => "afterTransfer",
        BeforeTransfer = 14 => "beforeTransfer",
        OnAllowance = 15 => "onAllowance",
    }
);

event_enum!(
    /// Hooks of `HolographERC721`.
    Erc721Event, "HolographERC721Event" {
        BridgeIn = 1 => "bridgeIn",
        BridgeOut = 2 => "bridgeOut",
        AfterApprove = 3 => "afterApprove",
        BeforeApprove = 4 => "beforeApprove",
        AfterApprovalAll = 5 => "afterApprovalAll",
        BeforeApprovalAll = 6 => "beforeApprovalAll",
        AfterBurn = 7 => "afterBurn",
        BeforeBurn = 8 => "beforeBurn",
        AfterMint = 9 => "afterMint",
        BeforeMint = 10 => "beforeMint",
        AfterSafeTransfer = 11 => "afterSafeTransfer",
        BeforeSafeTransfer = 12 => "beforeSafeTransfer",
        AfterTransfer = 13 => "afterTransfer",
        BeforeTransfer = 14 => "beforeTransfer",
        BeforeOnErc721Received = 15 => "beforeOnERC721Received",
        AfterOnErc721Received = 16 => "afterOnERC721Received",
        OnIsApprovedForAll = 17 => "onIsApprovedForAll",
        CustomContractUri = 18 => "customContractURI",
    }
);

/// Sets one bit per event.
pub fn configure_events<E: EventKind>(events: &[E]) -> B256 {
    let mask = events
        .iter()
        .fold(U256::ZERO, |mask, e| mask | (U256::from(1u8) << usize::from(e.bit())));
    B256::from(mask.to_be_bytes::<32>())
}

/// Every hook enabled.
pub fn all_events_enabled() -> B256 {
    B256::repeat_byte(0xff)
}

/// True when the bit for `event` is set in `config`.
pub fn is_event_registered<E: EventKind>(config: B256, event: E) -> bool {
    let mask = U256::from_be_bytes(config.0);
    mask.bit(usize::from(event.bit()))
}

/// Parses a list of event names for either token standard. Names may carry the
/// enum prefix (`HolographERC721Event.beforeTransfer`) or not; the standard is
/// picked from the first prefixed name, defaulting to ERC721.
pub fn parse_event_config(names: &[String]) -> Result<B256, DeployError> {
    let erc20 = names
        .iter()
        .find_map(|n| {
            if n.starts_with("HolographERC20Event.") {
                Some(true)
            } else if n.starts_with("HolographERC721Event.") {
                Some(false)
            } else {
                None
            }
        })
        .unwrap_or(false);

    if erc20 {
        let events = names
            .iter()
            .map(|n| n.parse::<Erc20Event>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(configure_events(&events))
    } else {
        let events = names
            .iter()
            .map(|n| n.parse::<Erc721Event>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(configure_events(&events))
    }
}

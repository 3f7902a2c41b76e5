//! Chain module - supported chains, endpoint pools and RPC sessions
//!
//! This module provides:
//! - The closed set of chains a transfer can start from or land on
//! - Built-in public endpoints used when nothing is configured
//! - Round-robin endpoint pools keyed by attempt number
//! - Websocket RPC sessions bound to a single endpoint

pub mod pool;
pub mod provider;

pub use pool::{EndpointPair, EndpointPool};
pub use provider::EndpointConnection;

use crate::error::TransferError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chains a transfer can be routed between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Polkadot,
    AssetHubPolkadot,
    Hydration,
    Moonbeam,
    Astar,
    BifrostPolkadot,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Polkadot,
        Chain::AssetHubPolkadot,
        Chain::Hydration,
        Chain::Moonbeam,
        Chain::Astar,
        Chain::BifrostPolkadot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Polkadot => "Polkadot",
            Chain::AssetHubPolkadot => "AssetHubPolkadot",
            Chain::Hydration => "Hydration",
            Chain::Moonbeam => "Moonbeam",
            Chain::Astar => "Astar",
            Chain::BifrostPolkadot => "BifrostPolkadot",
        }
    }

    /// Public endpoints used when no pool is configured for the chain.
    /// Never empty.
    pub fn fallback_endpoints(&self) -> &'static [&'static str] {
        match self {
            Chain::Polkadot => &[
                "wss://rpc.polkadot.io",
                "wss://polkadot-rpc.dwellir.com",
                "wss://rpc.ibp.network/polkadot",
            ],
            Chain::AssetHubPolkadot => &[
                "wss://polkadot-asset-hub-rpc.polkadot.io",
                "wss://asset-hub-polkadot-rpc.dwellir.com",
                "wss://sys.ibp.network/asset-hub-polkadot",
            ],
            Chain::Hydration => &[
                "wss://hydration-rpc.n.dwellir.com",
                "wss://rpc.hydradx.cloud",
                "wss://hydration.ibp.network",
            ],
            Chain::Moonbeam => &[
                "wss://wss.api.moonbeam.network",
                "wss://moonbeam-rpc.dwellir.com",
            ],
            Chain::Astar => &["wss://rpc.astar.network", "wss://astar-rpc.dwellir.com"],
            Chain::BifrostPolkadot => &[
                "wss://hk.p.bifrost-rpc.liebi.com/ws",
                "wss://bifrost-polkadot-rpc.dwellir.com",
            ],
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TransferError::Config(format!("Unsupported chain: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("hydration".parse::<Chain>().unwrap(), Chain::Hydration);
        assert_eq!(
            " AssetHubPolkadot ".parse::<Chain>().unwrap(),
            Chain::AssetHubPolkadot
        );
        assert!("Kusama".parse::<Chain>().is_err());
    }

    #[test]
    fn test_every_chain_has_fallback() {
        for chain in Chain::ALL {
            assert!(!chain.fallback_endpoints().is_empty(), "{} has no endpoints", chain);
        }
    }
}

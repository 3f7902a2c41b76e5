//! Asset registry: symbol to asset id and decimals

use crate::chain::Chain;
use crate::config::Settings;
use crate::error::{TransferError, TransferResult};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

/// Asset as known on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetInfo {
    pub chain: Chain,
    pub symbol: String,
    /// Chain-local identifier, `native` for the chain's own token
    pub id: String,
    pub decimals: u8,
}

impl AssetInfo {
    fn new(chain: Chain, symbol: &str, id: &str, decimals: u8) -> Self {
        Self {
            chain,
            symbol: symbol.to_ascii_uppercase(),
            id: id.to_string(),
            decimals,
        }
    }
}

/// Resolves asset symbols on a chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    async fn lookup(&self, chain: Chain, symbol: &str) -> TransferResult<AssetInfo>;
}

/// Registry backed by the `[[assets]]` configuration entries
#[derive(Debug, Clone, Default)]
pub struct StaticAssetRegistry {
    assets: Vec<AssetInfo>,
}

impl StaticAssetRegistry {
    pub fn new(assets: Vec<AssetInfo>) -> Self {
        Self { assets }
    }

    pub fn from_settings(settings: &Settings) -> TransferResult<Self> {
        let assets = settings
            .assets
            .iter()
            .map(|entry| {
                let chain = entry.chain.parse::<Chain>()?;
                Ok(AssetInfo::new(chain, &entry.symbol, &entry.id, entry.decimals))
            })
            .collect::<TransferResult<Vec<_>>>()?;

        debug!("Asset registry loaded with {} entries", assets.len());
        Ok(Self::new(assets))
    }
}

#[async_trait]
impl AssetRegistry for StaticAssetRegistry {
    async fn lookup(&self, chain: Chain, symbol: &str) -> TransferResult<AssetInfo> {
        self.assets
            .iter()
            .find(|asset| {
                asset.chain == chain && asset.symbol.eq_ignore_ascii_case(symbol.trim())
            })
            .cloned()
            .ok_or_else(|| {
                TransferError::Registry(format!("{} is not registered on {}", symbol, chain))
            })
    }
}

/// Well-known assets used when the registry has no entry
pub fn guess_asset(chain: Chain, symbol: &str) -> Option<AssetInfo> {
    const KNOWN: &[(Chain, &str, &str, u8)] = &[
        (Chain::Polkadot, "DOT", "native", 10),
        (Chain::AssetHubPolkadot, "DOT", "native", 10),
        (Chain::AssetHubPolkadot, "USDT", "1984", 6),
        (Chain::AssetHubPolkadot, "USDC", "1337", 6),
        (Chain::Hydration, "HDX", "0", 12),
        (Chain::Hydration, "DOT", "5", 10),
        (Chain::Hydration, "USDT", "10", 6),
        (Chain::Hydration, "USDC", "22", 6),
        (Chain::Moonbeam, "GLMR", "native", 18),
        (Chain::Astar, "ASTR", "native", 18),
        (Chain::BifrostPolkadot, "BNC", "native", 12),
    ];

    let symbol = symbol.trim();
    KNOWN
        .iter()
        .find(|(known_chain, known_symbol, _, _)| {
            *known_chain == chain && known_symbol.eq_ignore_ascii_case(symbol)
        })
        .map(|(chain, symbol, id, decimals)| AssetInfo::new(*chain, symbol, id, *decimals))
}

/// Look an asset up, falling back to the built-in guess table
pub async fn resolve_asset(
    registry: &dyn AssetRegistry,
    chain: Chain,
    symbol: &str,
) -> TransferResult<AssetInfo> {
    match registry.lookup(chain, symbol).await {
        Ok(asset) => Ok(asset),
        Err(e) => match guess_asset(chain, symbol) {
            Some(asset) => {
                warn!(
                    "Registry lookup failed ({}), using built-in id {} for {}",
                    e, asset.id, asset.symbol
                );
                Ok(asset)
            }
            None => Err(TransferError::Registry(format!(
                "Unknown asset {} on {}: {}",
                symbol, chain, e
            ))),
        },
    }
}

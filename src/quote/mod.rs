//! Best-effort quote resolution
//!
//! Resolves both symbols through the asset registry (with a built-in guess
//! when the registry fails) and asks the router for the best sell. Read-only,
//! no retries.

pub mod registry;
pub mod router;

pub use registry::{resolve_asset, AssetRegistry, StaticAssetRegistry};
pub use router::{HttpRouteQuoter, RouteQuoter};

use crate::chain::Chain;
use crate::error::TransferResult;
use crate::transfer::units;

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Quote output written for the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub route: Option<serde_json::Value>,
}

pub struct QuoteService {
    chain: Chain,
    registry: Arc<dyn AssetRegistry>,
    quoter: Arc<dyn RouteQuoter>,
}

impl QuoteService {
    pub fn new(
        chain: Chain,
        registry: Arc<dyn AssetRegistry>,
        quoter: Arc<dyn RouteQuoter>,
    ) -> Self {
        Self {
            chain,
            registry,
            quoter,
        }
    }

    pub async fn quote(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: &str,
    ) -> TransferResult<QuoteRecord> {
        let asset_in = resolve_asset(self.registry.as_ref(), self.chain, token_in).await?;
        let asset_out = resolve_asset(self.registry.as_ref(), self.chain, token_out).await?;

        let units_in = units::to_minor_units(amount_in, asset_in.decimals)?;
        let quote = self.quoter.best_sell(&asset_in, &asset_out, units_in).await?;
        let amount_out = units::from_minor_units(quote.amount_out, asset_out.decimals);

        info!(
            "Quote on {}: {} {} -> {} {}",
            self.chain, amount_in, asset_in.symbol, amount_out, asset_out.symbol
        );
        crate::metrics::record_quote(self.chain);

        Ok(QuoteRecord {
            token_in: asset_in.symbol,
            token_out: asset_out.symbol,
            amount_in: amount_in.trim().to_string(),
            amount_out,
            route: quote.route,
        })
    }
}

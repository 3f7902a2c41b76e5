//! Route quoting against an external router service

use super::registry::AssetInfo;
use crate::config::QuoteConfig;
use crate::error::{TransferError, TransferResult};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Best sell found by a router
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuote {
    /// Output in minor units of the output asset
    pub amount_out: u128,
    /// Opaque path description, if the router returned one
    pub route: Option<serde_json::Value>,
}

/// Finds the best output amount and path for a sell
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteQuoter: Send + Sync {
    async fn best_sell(
        &self,
        asset_in: &AssetInfo,
        asset_out: &AssetInfo,
        amount_in: u128,
    ) -> TransferResult<RouteQuote>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    amount_out: String,
    #[serde(default)]
    route: Option<serde_json::Value>,
}

/// Router reached over HTTP: `GET {router_url}/quote`
pub struct HttpRouteQuoter {
    client: Client,
    base_url: Url,
}

impl HttpRouteQuoter {
    pub fn new(config: &QuoteConfig) -> TransferResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        let base_url = Url::parse(&config.router_url).map_err(|e| {
            TransferError::Config(format!("Invalid router URL {}: {}", config.router_url, e))
        })?;

        Ok(Self { client, base_url })
    }

    fn quote_url(&self) -> TransferResult<Url> {
        join(&self.base_url, "quote")
    }
}

#[async_trait]
impl RouteQuoter for HttpRouteQuoter {
    async fn best_sell(
        &self,
        asset_in: &AssetInfo,
        asset_out: &AssetInfo,
        amount_in: u128,
    ) -> TransferResult<RouteQuote> {
        let url = self.quote_url()?;
        debug!(
            "Quoting {} {} -> {} on {}",
            amount_in, asset_in.id, asset_out.id, asset_in.chain
        );

        let response = self
            .client
            .get(url)
            .query(&[
                ("chain", asset_in.chain.name().to_string()),
                ("assetIn", asset_in.id.clone()),
                ("assetOut", asset_out.id.clone()),
                ("amountIn", amount_in.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Quote(format!(
                "router returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let quote: QuoteResponse = response.json().await?;
        parse_quote(quote)
    }
}

fn parse_quote(quote: QuoteResponse) -> TransferResult<RouteQuote> {
    let amount_out = quote.amount_out.trim().parse::<u128>().map_err(|_| {
        TransferError::Quote(format!("router returned invalid amountOut {:?}", quote.amount_out))
    })?;

    Ok(RouteQuote {
        amount_out,
        route: quote.route.filter(|route| !route.is_null()),
    })
}

/// Append a path segment to a base URL, keeping any base path
pub(crate) fn join(base: &Url, segment: &str) -> TransferResult<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(segment)
        .map_err(|e| TransferError::Config(format!("Cannot build URL from {}: {}", base, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_keeps_base_path() {
        let base = Url::parse("https://api.example.com/v4").unwrap();
        assert_eq!(
            join(&base, "x-transfer").unwrap().as_str(),
            "https://api.example.com/v4/x-transfer"
        );
        let base = Url::parse("http://127.0.0.1:8788").unwrap();
        assert_eq!(join(&base, "quote").unwrap().as_str(), "http://127.0.0.1:8788/quote");
    }

    #[test]
    fn test_parse_quote_response() {
        let quote: QuoteResponse = serde_json::from_str(
            r#"{"amountOut": "4218000", "route": [{"pool": "Omnipool", "assetIn": "5", "assetOut": "10"}]}"#,
        )
        .unwrap();
        let quote = parse_quote(quote).unwrap();
        assert_eq!(quote.amount_out, 4_218_000);
        assert!(quote.route.unwrap().is_array());

        let quote: QuoteResponse =
            serde_json::from_str(r#"{"amountOut": "12", "route": null}"#).unwrap();
        assert_eq!(parse_quote(quote).unwrap().route, None);

        let quote: QuoteResponse = serde_json::from_str(r#"{"amountOut": "lots"}"#).unwrap();
        assert!(matches!(parse_quote(quote), Err(TransferError::Quote(_))));
    }
}

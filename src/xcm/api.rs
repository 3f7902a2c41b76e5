//! HTTP client for the XCM transfer-construction service

use crate::chain::Chain;
use crate::config::XcmApiConfig;
use crate::error::{TransferError, TransferResult};
use crate::quote::router::join;
use crate::transfer::DryRunReport;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Body shared by the transfer and dry-run calls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XTransferRequest {
    pub from: Chain,
    pub to: Chain,
    pub currency: Currency,
    /// Recipient on the destination chain
    pub address: String,
    pub sender_address: String,
    pub options: TransferOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Currency {
    pub symbol: String,
    /// Human decimal when `abstract_decimals` is set, minor units otherwise
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOptions {
    pub abstract_decimals: bool,
    /// Endpoint the service must use per chain
    pub api_overrides: HashMap<Chain, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunResponse {
    pub origin: DryRunLeg,
    #[serde(default)]
    pub destination: Option<DryRunLeg>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunLeg {
    pub success: bool,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

pub struct XcmApiClient {
    client: Client,
    base_url: Url,
}

impl XcmApiClient {
    pub fn new(config: &XcmApiConfig) -> TransferResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        let base_url = Url::parse(&config.url).map_err(|e| {
            TransferError::Config(format!("Invalid XCM API URL {}: {}", config.url, e))
        })?;

        Ok(Self { client, base_url })
    }

    /// Encoded transfer call for the request, as `0x` hex
    pub async fn transfer_call(&self, request: &XTransferRequest) -> TransferResult<String> {
        let url = join(&self.base_url, "x-transfer")?;
        let response = self.client.post(url.clone()).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransferError::Build {
                endpoint: url.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), body.trim()),
            });
        }

        debug!("Transfer call built ({} bytes of response)", body.len());
        normalize_call_data(&body).map_err(|message| TransferError::Build {
            endpoint: url.to_string(),
            message,
        })
    }

    pub async fn dry_run(&self, request: &XTransferRequest) -> TransferResult<DryRunResponse> {
        let url = join(&self.base_url, "dry-run")?;
        let response = self.client.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Validation(format!(
                "dry-run returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        Ok(response.json().await?)
    }
}

/// Accept `0x…` either bare or as a JSON string; reject anything that is not hex
pub fn normalize_call_data(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim().trim_matches('"');
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err("empty call data".to_string());
    }
    let bytes = hex::decode(digits).map_err(|e| format!("call data is not hex: {}", e))?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Turn a dry-run response into a report, failing if either leg failed
pub fn interpret_dry_run(response: DryRunResponse) -> TransferResult<DryRunReport> {
    let leg_error = |leg: &str, dry_run: &DryRunLeg| {
        TransferError::Validation(format!(
            "{} leg failed: {}",
            leg,
            dry_run.failure_reason.as_deref().unwrap_or("no reason given")
        ))
    };

    if !response.origin.success {
        return Err(leg_error("origin", &response.origin));
    }
    if let Some(destination) = &response.destination {
        if !destination.success {
            return Err(leg_error("destination", destination));
        }
    }

    Ok(DryRunReport {
        origin_fee: response.origin.fee,
        destination_fee: response.destination.and_then(|leg| leg.fee),
    })
}

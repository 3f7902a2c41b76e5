//! Configuration management for the transfer relay
//!
//! Loads an optional TOML file with environment variable substitution, then
//! applies the environment overrides an operator sets per run.

use crate::chain::Chain;
use crate::error::{TransferError, TransferResult};
use crate::secret::SecretString;
use crate::transfer::DryRunPolicy;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transfer: TransferConfig,
    pub retry: RetryConfig,
    /// Endpoint pools keyed by chain name
    pub chains: HashMap<String, ChainConfig>,
    pub xcm_api: XcmApiConfig,
    pub signer: SignerConfig,
    pub quote: QuoteConfig,
    pub assets: Vec<AssetConfig>,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub source_chain: Chain,
    pub destination_chain: Chain,
    pub asset: String,
    pub amount: String,
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub abstract_decimals: bool,
    pub source_rpc_url: Option<String>,
    pub destination_rpc_url: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source_chain: Chain::AssetHubPolkadot,
            destination_chain: Chain::Hydration,
            asset: "DOT".to_string(),
            amount: "0.1".to_string(),
            source_address: None,
            destination_address: None,
            abstract_decimals: true,
            source_rpc_url: None,
            destination_rpc_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub dry_run_policy: DryRunPolicy,
    /// How many failed attempts are kept for the exhaustion report
    pub failure_history: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            backoff_ms: 4000,
            dry_run_policy: DryRunPolicy::Advisory,
            failure_history: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    pub rpc_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XcmApiConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for XcmApiConfig {
    fn default() -> Self {
        Self {
            url: "https://api.lightspell.xyz/v4".to_string(),
            connect_timeout_ms: 15_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub url: String,
    pub credential: Option<SecretString>,
    pub request_timeout_ms: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8787".to_string(),
            credential: None,
            request_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub chain: Chain,
    pub router_url: String,
    pub request_timeout_ms: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            chain: Chain::Hydration,
            router_url: "http://127.0.0.1:8788".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub chain: String,
    pub symbol: String,
    pub id: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Where to write text-format metrics when the run ends
    pub textfile_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the config file (if any) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("XCM_RELAY_CONFIG").ok().map(PathBuf::from));

        let mut settings = match config_path {
            Some(config_path) => Self::from_file(&config_path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        settings.apply_overrides(|key| env::var(key).ok())?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parse a TOML file after substituting `${VAR}` references
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config_str = substitute_env_vars(&config_str);

        toml::from_str(&config_str).with_context(|| "Failed to parse configuration")
    }

    /// Apply per-run overrides. `lookup` returns the value of a key if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("SOURCE_ADDRESS") {
            self.transfer.source_address = Some(value);
        }
        if let Some(value) = get("DEST_ADDRESS") {
            self.transfer.destination_address = Some(value);
        }
        if let Some(value) = get("SIGNER_CREDENTIAL") {
            self.signer.credential = Some(SecretString::new(value));
        }
        if let Some(value) = get("SOURCE_RPC_URL") {
            self.transfer.source_rpc_url = Some(value);
        }
        if let Some(value) = get("DEST_RPC_URL") {
            self.transfer.destination_rpc_url = Some(value);
        }
        if let Some(value) = get("TRANSFER_AMOUNT") {
            self.transfer.amount = value;
        }
        if let Some(value) = get("TRANSFER_ASSET") {
            self.transfer.asset = value;
        }
        if let Some(value) = get("MAX_ATTEMPTS") {
            self.retry.max_attempts = value
                .trim()
                .parse()
                .with_context(|| format!("MAX_ATTEMPTS is not a number: {}", value))?;
        }
        if let Some(value) = get("BACKOFF_MS") {
            self.retry.backoff_ms = value
                .trim()
                .parse()
                .with_context(|| format!("BACKOFF_MS is not a number: {}", value))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        if self.transfer.source_chain == self.transfer.destination_chain {
            anyhow::bail!(
                "Source and destination chain are both {}",
                self.transfer.source_chain
            );
        }

        for (name, chain) in &self.chains {
            name.parse::<Chain>()?;
            if chain.rpc_urls.is_empty() {
                anyhow::bail!("Chain {} has an empty rpc_urls list", name);
            }
            for url in &chain.rpc_urls {
                validate_endpoint(url)?;
            }
        }

        for url in [
            &self.transfer.source_rpc_url,
            &self.transfer.destination_rpc_url,
        ]
        .into_iter()
        .flatten()
        {
            validate_endpoint(url)?;
        }

        for asset in &self.assets {
            asset.chain.parse::<Chain>()?;
        }

        Url::parse(&self.xcm_api.url)
            .with_context(|| format!("Invalid xcm_api.url: {}", self.xcm_api.url))?;
        Url::parse(&self.signer.url)
            .with_context(|| format!("Invalid signer.url: {}", self.signer.url))?;
        Url::parse(&self.quote.router_url)
            .with_context(|| format!("Invalid quote.router_url: {}", self.quote.router_url))?;

        Ok(())
    }

    /// Configured pool for a chain, matched case-insensitively by name
    pub fn chain_config(&self, chain: Chain) -> Option<&ChainConfig> {
        self.chains
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(chain.name()))
            .map(|(_, config)| config)
    }

    /// Primary endpoint override for a chain, if the chain is an end of the transfer
    pub fn primary_endpoint(&self, chain: Chain) -> Option<&str> {
        if chain == self.transfer.source_chain {
            self.transfer.source_rpc_url.as_deref()
        } else if chain == self.transfer.destination_chain {
            self.transfer.destination_rpc_url.as_deref()
        } else {
            None
        }
    }

    /// Signer credential, required before a transfer may start
    pub fn require_credential(&self) -> TransferResult<&SecretString> {
        self.signer
            .credential
            .as_ref()
            .filter(|credential| !credential.is_empty())
            .ok_or_else(|| {
                TransferError::Config(
                    "No signing credential configured. Set SIGNER_CREDENTIAL".to_string(),
                )
            })
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint).with_context(|| format!("Invalid RPC URL: {}", endpoint))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => anyhow::bail!("RPC URL {} uses unsupported scheme {}", endpoint, other),
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

//! Round-robin endpoint pools keyed by attempt number

use super::Chain;
use crate::config::Settings;
use crate::error::{TransferError, TransferResult};

use std::collections::HashMap;
use tracing::debug;

/// Endpoints bound to one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPair {
    pub source: String,
    pub destination: String,
}

/// Per-chain endpoint lists, fixed once built
#[derive(Debug, Clone, Default)]
pub struct EndpointPool {
    endpoints: HashMap<Chain, Vec<String>>,
}

impl EndpointPool {
    /// Create a pool from explicit per-chain lists
    pub fn new(endpoints: HashMap<Chain, Vec<String>>) -> TransferResult<Self> {
        if let Some((chain, _)) = endpoints.iter().find(|(_, urls)| urls.is_empty()) {
            return Err(TransferError::Config(format!(
                "Endpoint pool for {} is empty",
                chain
            )));
        }
        Ok(Self { endpoints })
    }

    /// Build the pool from configured RPC lists and primary overrides
    pub fn from_settings(settings: &Settings) -> TransferResult<Self> {
        let mut endpoints = HashMap::new();

        for chain in Chain::ALL {
            let mut urls: Vec<String> = match settings.chain_config(chain) {
                Some(config) if !config.rpc_urls.is_empty() => config.rpc_urls.clone(),
                _ => chain
                    .fallback_endpoints()
                    .iter()
                    .map(|url| url.to_string())
                    .collect(),
            };

            if let Some(primary) = settings.primary_endpoint(chain) {
                urls.retain(|url| url != primary);
                urls.insert(0, primary.to_string());
            }

            debug!("Endpoint pool for {}: {:?}", chain, urls);
            endpoints.insert(chain, urls);
        }

        Self::new(endpoints)
    }

    /// Endpoint for `chain` on the 1-based `attempt`
    pub fn select(&self, chain: Chain, attempt: u32) -> &str {
        let index = attempt.saturating_sub(1) as usize;
        match self.endpoints.get(&chain) {
            Some(urls) => &urls[index % urls.len()],
            None => {
                let fallback = chain.fallback_endpoints();
                fallback[index % fallback.len()]
            }
        }
    }

    /// Source and destination endpoints for the same attempt
    pub fn pair(&self, source: Chain, destination: Chain, attempt: u32) -> EndpointPair {
        EndpointPair {
            source: self.select(source, attempt).to_string(),
            destination: self.select(destination, attempt).to_string(),
        }
    }

    /// Number of endpoints that rotate for a chain
    pub fn pool_size(&self, chain: Chain) -> usize {
        self.endpoints
            .get(&chain)
            .map(|urls| urls.len())
            .unwrap_or_else(|| chain.fallback_endpoints().len())
    }
}

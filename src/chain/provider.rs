//! Websocket RPC session bound to one endpoint

use super::Chain;
use crate::error::{TransferError, TransferResult};

use ethers::providers::{Provider, Ws};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Live connection to a single chain endpoint
pub struct EndpointConnection {
    chain: Chain,
    url: String,
    provider: Provider<Ws>,
    /// Chain name as reported by the node
    reported_chain: String,
    /// Finalized head hash at connect time
    finalized_head: String,
    call_timeout: Duration,
}

impl EndpointConnection {
    /// Connect and fetch the chain metadata needed to build against this endpoint
    pub async fn connect(chain: Chain, url: &str, call_timeout: Duration) -> TransferResult<Self> {
        let provider = match timeout(call_timeout, Provider::<Ws>::connect(url)).await {
            Ok(Ok(provider)) => provider,
            Ok(Err(e)) => {
                return Err(TransferError::Build {
                    endpoint: url.to_string(),
                    message: format!("websocket connect failed: {}", e),
                })
            }
            Err(_) => {
                return Err(TransferError::Build {
                    endpoint: url.to_string(),
                    message: format!("connect timed out after {:?}", call_timeout),
                })
            }
        };

        let mut connection = Self {
            chain,
            url: url.to_string(),
            provider,
            reported_chain: String::new(),
            finalized_head: String::new(),
            call_timeout,
        };

        let reported_chain: String = connection
            .request("system_chain", Vec::<String>::new())
            .await
            .map_err(|e| connection.metadata_error(e))?;
        let finalized_head: String = connection
            .request("chain_getFinalizedHead", Vec::<String>::new())
            .await
            .map_err(|e| connection.metadata_error(e))?;
        connection.reported_chain = reported_chain;
        connection.finalized_head = finalized_head;

        debug!(
            "Connected to {} at {} (node reports {:?}, finalized {})",
            chain, url, connection.reported_chain, connection.finalized_head
        );

        Ok(connection)
    }

    /// Raw JSON-RPC call bounded by the call timeout
    pub async fn request<P, R>(&self, method: &str, params: P) -> TransferResult<R>
    where
        P: Debug + Serialize + Send + Sync,
        R: Serialize + DeserializeOwned + Debug + Send,
    {
        match timeout(self.call_timeout, self.provider.request(method, params)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TransferError::Rpc {
                endpoint: self.url.clone(),
                message: format!("{}: {}", method, e),
            }),
            Err(_) => Err(TransferError::Timeout {
                operation: format!("{} on {}", method, self.url),
            }),
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn reported_chain(&self) -> &str {
        &self.reported_chain
    }

    pub fn finalized_head(&self) -> &str {
        &self.finalized_head
    }

    /// Close the websocket
    pub fn disconnect(self) {
        debug!("Disconnecting from {} at {}", self.chain, self.url);
        drop(self.provider);
    }

    fn metadata_error(&self, e: TransferError) -> TransferError {
        TransferError::Build {
            endpoint: self.url.clone(),
            message: format!("chain metadata fetch failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_build_failure() {
        let result = EndpointConnection::connect(
            Chain::Hydration,
            "ws://127.0.0.1:1",
            Duration::from_secs(2),
        )
        .await;

        match result {
            Err(TransferError::Build { endpoint, .. }) => assert_eq!(endpoint, "ws://127.0.0.1:1"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}

//! Signer that delegates signing and broadcast to a signing service

use crate::config::SignerConfig;
use crate::error::{TransferError, TransferResult};
use crate::quote::router::join;
use crate::secret::SecretString;
use crate::transfer::{SignablePayload, Signer, TxId};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
}

/// Posts payloads to `{signer_url}/sign-and-submit` with a bearer credential
pub struct RemoteSigner {
    client: Client,
    base_url: Url,
    credential: SecretString,
}

impl RemoteSigner {
    pub fn new(config: &SignerConfig, credential: SecretString) -> TransferResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        let base_url = Url::parse(&config.url).map_err(|e| {
            TransferError::Config(format!("Invalid signer URL {}: {}", config.url, e))
        })?;

        Ok(Self {
            client,
            base_url,
            credential,
        })
    }
}

#[async_trait]
impl Signer for RemoteSigner {
    async fn sign_and_submit(&self, payload: &SignablePayload) -> TransferResult<TxId> {
        let url = join(&self.base_url, "sign-and-submit")?;

        let response = self
            .client
            .post(url)
            .bearer_auth(self.credential.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| TransferError::Submission(format!("signer unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Submission(format!(
                "signer returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TransferError::Submission(format!("unreadable signer response: {}", e)))?;
        if submitted.tx_hash.trim().is_empty() {
            return Err(TransferError::Submission(
                "signer returned an empty transaction hash".to_string(),
            ));
        }

        info!("Signer accepted payload via {}", payload.endpoint);
        Ok(TxId(submitted.tx_hash.trim().to_string()))
    }
}

//! Capabilities the orchestrator drives: transfer builders and signers
//!
//! A builder turns a route bound to one endpoint pair into a prepared
//! transfer. The prepared transfer owns the endpoint connections until it is
//! disconnected; a signer authorizes and submits the payload it produces.

use super::route::RouteDescriptor;
use crate::chain::{Chain, EndpointPair};
use crate::error::TransferResult;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A route bound to the endpoints selected for one attempt
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub attempt: u32,
    pub route: Arc<RouteDescriptor>,
    pub endpoints: EndpointPair,
}

/// Encoded call ready for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignablePayload {
    pub chain: Chain,
    /// Endpoint the payload was built against
    pub endpoint: String,
    pub sender: String,
    /// `0x`-prefixed hex of the encoded call
    pub call_data: String,
}

/// Outcome of a successful preview
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunReport {
    pub origin_fee: Option<String>,
    pub destination_fee: Option<String>,
}

/// Opaque transaction identifier returned by a signer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces prepared transfers bound to a concrete endpoint pair
#[async_trait]
pub trait TransferBuilder: Send + Sync {
    async fn prepare(&self, ctx: &AttemptContext) -> TransferResult<Box<dyn PreparedTransfer>>;
}

/// Connection-bound transfer scoped to a single attempt
#[async_trait]
pub trait PreparedTransfer: Send + Sync {
    /// Preview the transfer. `Ok(None)` means no preview is available.
    async fn dry_run(&self) -> TransferResult<Option<DryRunReport>> {
        Ok(None)
    }

    async fn build_payload(&self) -> TransferResult<SignablePayload>;

    /// Release the endpoint connections
    async fn disconnect(self: Box<Self>) -> TransferResult<()>;
}

/// Authorizes and submits a payload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign_and_submit(&self, payload: &SignablePayload) -> TransferResult<TxId>;
}

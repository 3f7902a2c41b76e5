//! Transfer submission engine
//!
//! Route descriptors, decimal handling, the builder/signer capabilities and
//! the orchestrator that retries a submission across the endpoint pool.

pub mod builder;
pub mod orchestrator;
pub mod route;
pub mod units;

pub use builder::{
    AttemptContext, DryRunReport, PreparedTransfer, SignablePayload, Signer, TransferBuilder,
    TxId,
};
pub use orchestrator::{DryRunPolicy, RetryPolicy, SubmissionOrchestrator, SubmissionReceipt};
pub use route::RouteDescriptor;

use crate::chain::EndpointPool;
use crate::config::Settings;
use crate::error::TransferResult;

use std::sync::Arc;
use tracing::info;

/// Run the configured transfer end to end.
///
/// Required inputs are checked before the first attempt; a missing address
/// or credential never reaches the builder.
pub async fn run_transfer(
    settings: &Settings,
    pool: Arc<EndpointPool>,
    builder: Arc<dyn TransferBuilder>,
    signer: Arc<dyn Signer>,
) -> TransferResult<SubmissionReceipt> {
    let route = RouteDescriptor::from_settings(settings)?;
    settings.require_credential()?;

    info!(
        "Route {} from {} to {}",
        route, route.source_address, route.destination_address
    );

    let orchestrator = SubmissionOrchestrator::new(
        pool,
        builder,
        signer,
        RetryPolicy::from(&settings.retry),
    );
    orchestrator.submit(route).await
}

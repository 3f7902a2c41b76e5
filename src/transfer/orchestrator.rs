//! Submission orchestrator: sequential attempts with fixed backoff
//!
//! Every attempt binds the route to the endpoint pair chosen by its index,
//! prepares the transfer, previews it, signs and submits. A retryable failure
//! moves on to the next attempt after the backoff, anything else ends the run
//! at once. The prepared transfer of an attempt is always disconnected before
//! the next attempt starts.

use super::builder::{AttemptContext, PreparedTransfer, Signer, TransferBuilder, TxId};
use super::route::RouteDescriptor;
use crate::chain::{EndpointPair, EndpointPool};
use crate::config::RetryConfig;
use crate::error::{AttemptFailure, AttemptStage, TransferError, TransferResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What a failed dry-run does to the attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DryRunPolicy {
    /// Log the failure and submit anyway
    #[default]
    Advisory,
    /// Fail the attempt and move on to the next one
    Enforce,
}

/// Retry budget for one submission
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub dry_run: DryRunPolicy,
    pub failure_history: usize,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
            dry_run: config.dry_run_policy,
            failure_history: config.failure_history,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub tx_id: TxId,
    pub attempts: u32,
    pub source_endpoint: String,
    pub destination_endpoint: String,
    pub submitted_at: DateTime<Utc>,
}

/// Most recent attempt failures, oldest dropped first
struct FailureHistory {
    limit: usize,
    failures: VecDeque<AttemptFailure>,
}

impl FailureHistory {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            failures: VecDeque::with_capacity(limit),
        }
    }

    fn record(&mut self, failure: AttemptFailure) {
        if self.limit == 0 {
            return;
        }
        if self.failures.len() == self.limit {
            self.failures.pop_front();
        }
        self.failures.push_back(failure);
    }

    fn into_vec(self) -> Vec<AttemptFailure> {
        self.failures.into()
    }
}

/// Drives one logical transfer to a transaction id or to exhaustion
pub struct SubmissionOrchestrator {
    pool: Arc<EndpointPool>,
    builder: Arc<dyn TransferBuilder>,
    signer: Arc<dyn Signer>,
    policy: RetryPolicy,
}

impl SubmissionOrchestrator {
    pub fn new(
        pool: Arc<EndpointPool>,
        builder: Arc<dyn TransferBuilder>,
        signer: Arc<dyn Signer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            builder,
            signer,
            policy,
        }
    }

    /// Submit the route, retrying across the endpoint pool
    pub async fn submit(&self, route: RouteDescriptor) -> TransferResult<SubmissionReceipt> {
        let span = info_span!("submission", run_id = %Uuid::new_v4());
        self.run(Arc::new(route)).instrument(span).await
    }

    async fn run(&self, route: Arc<RouteDescriptor>) -> TransferResult<SubmissionReceipt> {
        let max_attempts = self.policy.max_attempts;
        let mut history = FailureHistory::new(self.policy.failure_history);

        info!(
            "Submitting {} (up to {} attempts, {:?} backoff)",
            route, max_attempts, self.policy.backoff
        );

        for attempt in 1..=max_attempts {
            let endpoints = self
                .pool
                .pair(route.source_chain, route.destination_chain, attempt);
            let ctx = AttemptContext {
                attempt,
                route: route.clone(),
                endpoints,
            };

            debug!(
                "Attempt {}/{} via {} -> {}",
                attempt, max_attempts, ctx.endpoints.source, ctx.endpoints.destination
            );

            let started = Instant::now();
            let outcome = self.run_attempt(&ctx).await;
            crate::metrics::record_attempt_latency(started.elapsed().as_secs_f64());

            match outcome {
                Ok(tx_id) => {
                    info!(
                        "Transfer submitted: {} (attempt {}/{})",
                        tx_id, attempt, max_attempts
                    );
                    crate::metrics::record_attempt(&route, "success");
                    crate::metrics::record_submission(&route);

                    let EndpointPair {
                        source,
                        destination,
                    } = ctx.endpoints;
                    return Ok(SubmissionReceipt {
                        tx_id,
                        attempts: attempt,
                        source_endpoint: source,
                        destination_endpoint: destination,
                        submitted_at: Utc::now(),
                    });
                }
                Err((stage, e)) => {
                    warn!(
                        "Attempt {}/{} failed at {}: {}",
                        attempt, max_attempts, stage, e
                    );
                    crate::metrics::record_attempt(&route, stage_label(stage));
                    if !e.is_retryable() {
                        error!("Attempt {} failed with a non-retryable error, giving up", attempt);
                        return Err(e);
                    }
                    history.record(AttemptFailure {
                        attempt,
                        stage,
                        source_endpoint: ctx.endpoints.source.clone(),
                        destination_endpoint: ctx.endpoints.destination.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if attempt < max_attempts {
                crate::metrics::record_backoff();
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        error!("Giving up on {} after {} attempts", route, max_attempts);
        crate::metrics::record_exhausted(&route);

        Err(TransferError::ExhaustedRetries {
            attempts: max_attempts,
            recent: history.into_vec(),
        })
    }

    /// One build -> preview -> submit cycle. The prepared transfer, once
    /// obtained, is disconnected on every exit path.
    async fn run_attempt(
        &self,
        ctx: &AttemptContext,
    ) -> Result<TxId, (AttemptStage, TransferError)> {
        let prepared = self
            .builder
            .prepare(ctx)
            .await
            .map_err(|e| (AttemptStage::Build, e))?;

        let outcome = self.drive(prepared.as_ref()).await;

        if let Err(e) = prepared.disconnect().await {
            warn!("Disconnect after attempt {} failed: {}", ctx.attempt, e);
        }

        outcome
    }

    async fn drive(
        &self,
        prepared: &dyn PreparedTransfer,
    ) -> Result<TxId, (AttemptStage, TransferError)> {
        match prepared.dry_run().await {
            Ok(Some(report)) => debug!(
                "Dry-run passed (origin fee {:?}, destination fee {:?})",
                report.origin_fee, report.destination_fee
            ),
            Ok(None) => debug!("Dry-run not available, skipping"),
            Err(e) => {
                crate::metrics::record_dry_run_failure();
                match self.policy.dry_run {
                    DryRunPolicy::Advisory => warn!("Dry-run failed, submitting anyway: {}", e),
                    DryRunPolicy::Enforce => return Err((AttemptStage::Validate, e)),
                }
            }
        }

        let payload = prepared
            .build_payload()
            .await
            .map_err(|e| (AttemptStage::Build, e))?;

        self.signer
            .sign_and_submit(&payload)
            .await
            .map_err(|e| (AttemptStage::Submit, e))
    }
}

fn stage_label(stage: AttemptStage) -> &'static str {
    match stage {
        AttemptStage::Build => "build_failed",
        AttemptStage::Validate => "validation_failed",
        AttemptStage::Submit => "submit_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::transfer::builder::{DryRunReport, MockSigner, SignablePayload};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    const BACKOFF: Duration = Duration::from_millis(4000);

    /// Shared counters observed across all attempts of a run
    #[derive(Default)]
    struct Tally {
        prepares: AtomicU32,
        disconnects: AtomicU32,
        open: AtomicI32,
        max_open: AtomicI32,
        dry_runs: AtomicU32,
        tried: Mutex<Vec<EndpointPair>>,
    }

    #[derive(Default)]
    struct FakeBuilder {
        tally: Arc<Tally>,
        /// Attempts up to and including this one fail to prepare
        fail_prepare_through: u32,
        /// Prepare rejects the route itself rather than the endpoint
        reject_route: bool,
        fail_dry_run: bool,
        fail_build_payload: bool,
        fail_disconnect: bool,
    }

    struct FakePrepared {
        tally: Arc<Tally>,
        ctx: AttemptContext,
        fail_dry_run: bool,
        fail_build_payload: bool,
        fail_disconnect: bool,
    }

    #[async_trait]
    impl TransferBuilder for FakeBuilder {
        async fn prepare(
            &self,
            ctx: &AttemptContext,
        ) -> TransferResult<Box<dyn PreparedTransfer>> {
            self.tally.prepares.fetch_add(1, Ordering::SeqCst);
            self.tally.tried.lock().unwrap().push(ctx.endpoints.clone());

            if self.reject_route {
                return Err(TransferError::Config(
                    "Amount 0.00000000001 has more than 10 decimal places".to_string(),
                ));
            }
            if ctx.attempt <= self.fail_prepare_through {
                return Err(TransferError::Build {
                    endpoint: ctx.endpoints.source.clone(),
                    message: "connection refused".to_string(),
                });
            }

            let open = self.tally.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.tally.max_open.fetch_max(open, Ordering::SeqCst);
            tokio::task::yield_now().await;

            Ok(Box::new(FakePrepared {
                tally: self.tally.clone(),
                ctx: ctx.clone(),
                fail_dry_run: self.fail_dry_run,
                fail_build_payload: self.fail_build_payload,
                fail_disconnect: self.fail_disconnect,
            }))
        }
    }

    #[async_trait]
    impl PreparedTransfer for FakePrepared {
        async fn dry_run(&self) -> TransferResult<Option<DryRunReport>> {
            self.tally.dry_runs.fetch_add(1, Ordering::SeqCst);
            if self.fail_dry_run {
                return Err(TransferError::Validation("fee exceeds balance".to_string()));
            }
            Ok(Some(DryRunReport::default()))
        }

        async fn build_payload(&self) -> TransferResult<SignablePayload> {
            if self.fail_build_payload {
                return Err(TransferError::Build {
                    endpoint: self.ctx.endpoints.source.clone(),
                    message: "metadata mismatch".to_string(),
                });
            }
            Ok(SignablePayload {
                chain: self.ctx.route.source_chain,
                endpoint: self.ctx.endpoints.source.clone(),
                sender: self.ctx.route.source_address.clone(),
                call_data: format!("0x{:02x}", self.ctx.attempt),
            })
        }

        async fn disconnect(self: Box<Self>) -> TransferResult<()> {
            self.tally.open.fetch_sub(1, Ordering::SeqCst);
            self.tally.disconnects.fetch_add(1, Ordering::SeqCst);
            if self.fail_disconnect {
                return Err(TransferError::Rpc {
                    endpoint: self.ctx.endpoints.source.clone(),
                    message: "socket already closed".to_string(),
                });
            }
            Ok(())
        }
    }

    fn route() -> RouteDescriptor {
        RouteDescriptor::new(
            Chain::AssetHubPolkadot,
            Chain::Hydration,
            "DOT",
            "0.1",
            "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5",
            "7KQx4f7yU3hqZHfvDVnSfe6mheE3FpnsjvjQNiyQLZyqcCUn",
            true,
        )
        .unwrap()
    }

    fn pool(per_chain: usize) -> Arc<EndpointPool> {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            Chain::AssetHubPolkadot,
            (1..=per_chain).map(|i| format!("wss://a{}", i)).collect(),
        );
        endpoints.insert(
            Chain::Hydration,
            (1..=per_chain).map(|i| format!("wss://b{}", i)).collect(),
        );
        Arc::new(EndpointPool::new(endpoints).unwrap())
    }

    fn policy(max_attempts: u32, dry_run: DryRunPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: BACKOFF,
            dry_run,
            failure_history: 3,
        }
    }

    fn orchestrator(
        pool: Arc<EndpointPool>,
        builder: FakeBuilder,
        signer: MockSigner,
        policy: RetryPolicy,
    ) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(pool, Arc::new(builder), Arc::new(signer), policy)
    }

    fn rejecting_signer() -> MockSigner {
        let mut signer = MockSigner::new();
        signer
            .expect_sign_and_submit()
            .returning(|_| Err(TransferError::Submission("bad signature".to_string())));
        signer
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_builds_fail_exhausts_after_n_attempts() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            fail_prepare_through: u32::MAX,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer.expect_sign_and_submit().never();

        let started = Instant::now();
        let result = orchestrator(pool(1), builder, signer, policy(3, DryRunPolicy::Advisory))
            .submit(route())
            .await;

        assert_eq!(tally.prepares.load(Ordering::SeqCst), 3);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 0);
        // Two backoff waits between three attempts.
        assert_eq!(started.elapsed(), BACKOFF * 2);
        match assert_err!(result) {
            TransferError::ExhaustedRetries { attempts, recent } => {
                assert_eq!(attempts, 3);
                assert_eq!(recent.len(), 3);
                assert!(recent.iter().all(|f| f.stage == AttemptStage::Build));
                assert_eq!(recent.last().unwrap().attempt, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_pairs_follow_attempt_index() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            ..Default::default()
        };

        let result = orchestrator(
            pool(2),
            builder,
            rejecting_signer(),
            policy(5, DryRunPolicy::Advisory),
        )
        .submit(route())
        .await;
        assert_err!(result);

        let tried: Vec<(String, String)> = tally
            .tried
            .lock()
            .unwrap()
            .iter()
            .map(|pair| (pair.source.clone(), pair.destination.clone()))
            .collect();
        let expected: Vec<(String, String)> = [1, 2, 1, 2, 1]
            .iter()
            .map(|i| (format!("wss://a{}", i), format!("wss://b{}", i)))
            .collect();
        assert_eq!(tried, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_second_attempt_stops_retrying() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            fail_prepare_through: 1,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer
            .expect_sign_and_submit()
            .times(1)
            .returning(|payload| {
                assert_eq!(payload.endpoint, "wss://a2");
                Ok(TxId("0xfeed".to_string()))
            });

        let started = Instant::now();
        let receipt = assert_ok!(
            orchestrator(pool(2), builder, signer, policy(5, DryRunPolicy::Advisory))
                .submit(route())
                .await
        );

        assert_eq!(receipt.tx_id, TxId("0xfeed".to_string()));
        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.source_endpoint, "wss://a2");
        assert_eq!(receipt.destination_endpoint, "wss://b2");
        assert_eq!(tally.prepares.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), BACKOFF);
        // Only the successful attempt produced a transfer, and it was released.
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(tally.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_prepared_transfer_disconnected_once() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            ..Default::default()
        };

        let result = orchestrator(
            pool(3),
            builder,
            rejecting_signer(),
            policy(4, DryRunPolicy::Advisory),
        )
        .submit(route())
        .await;

        assert_err!(result);
        assert_eq!(tally.prepares.load(Ordering::SeqCst), 4);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 4);
        assert_eq!(tally.max_open.load(Ordering::SeqCst), 1);
        assert_eq!(tally.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_advisory_dry_run_failure_still_submits() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            fail_dry_run: true,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer
            .expect_sign_and_submit()
            .times(1)
            .returning(|_| Ok(TxId("0xbeef".to_string())));

        let receipt = assert_ok!(
            orchestrator(pool(1), builder, signer, policy(5, DryRunPolicy::Advisory))
                .submit(route())
                .await
        );

        assert_eq!(receipt.attempts, 1);
        assert_eq!(tally.dry_runs.load(Ordering::SeqCst), 1);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforced_dry_run_failure_blocks_submission() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            fail_dry_run: true,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer.expect_sign_and_submit().never();

        let result = orchestrator(pool(1), builder, signer, policy(2, DryRunPolicy::Enforce))
            .submit(route())
            .await;

        match assert_err!(result) {
            TransferError::ExhaustedRetries { recent, .. } => {
                assert!(recent.iter().all(|f| f.stage == AttemptStage::Validate));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_error_does_not_undo_success() {
        let builder = FakeBuilder {
            fail_disconnect: true,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer
            .expect_sign_and_submit()
            .times(1)
            .returning(|_| Ok(TxId("0x01".to_string())));

        let receipt = assert_ok!(
            orchestrator(pool(1), builder, signer, policy(3, DryRunPolicy::Advisory))
                .submit(route())
                .await
        );
        assert_eq!(receipt.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_keeps_most_recent_failures() {
        let builder = FakeBuilder {
            fail_prepare_through: u32::MAX,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer.expect_sign_and_submit().never();

        let result = orchestrator(pool(2), builder, signer, policy(6, DryRunPolicy::Advisory))
            .submit(route())
            .await;

        match assert_err!(result) {
            TransferError::ExhaustedRetries { attempts, recent } => {
                assert_eq!(attempts, 6);
                let kept: Vec<u32> = recent.iter().map(|f| f.attempt).collect();
                assert_eq!(kept, vec![4, 5, 6]);
                assert_eq!(recent[0].source_endpoint, "wss://a2");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_error_ends_run_without_retrying() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            reject_route: true,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer.expect_sign_and_submit().never();

        let started = Instant::now();
        let result = orchestrator(pool(2), builder, signer, RetryPolicy::default())
            .submit(route())
            .await;

        assert!(matches!(assert_err!(result), TransferError::Config(_)));
        assert_eq!(tally.prepares.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_build_failure_still_disconnects() {
        let tally = Arc::new(Tally::default());
        let builder = FakeBuilder {
            tally: tally.clone(),
            fail_build_payload: true,
            ..Default::default()
        };
        let mut signer = MockSigner::new();
        signer.expect_sign_and_submit().never();

        let result = orchestrator(pool(2), builder, signer, policy(3, DryRunPolicy::Advisory))
            .submit(route())
            .await;

        match assert_err!(result) {
            TransferError::ExhaustedRetries { recent, .. } => {
                assert!(recent.iter().all(|f| f.stage == AttemptStage::Build));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(tally.prepares.load(Ordering::SeqCst), 3);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 3);
        assert_eq!(tally.open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.backoff, Duration::from_millis(4000));
        assert_eq!(policy.dry_run, DryRunPolicy::Advisory);
    }
}

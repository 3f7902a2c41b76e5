//! Prometheus metrics for submission runs
//!
//! Tracks:
//! - Attempts per route and outcome
//! - Attempt latency
//! - Backoffs, exhausted runs and dry-run failures
//! - Quotes served
//!
//! The process is one-shot, so instead of serving `/metrics` the registry is
//! written out in text format for the node exporter textfile collector.

use crate::chain::Chain;
use crate::transfer::RouteDescriptor;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::path::Path;
use tracing::info;

lazy_static! {
    // Attempt metrics
    pub static ref ATTEMPTS: CounterVec = register_counter_vec!(
        "xcm_relay_attempts_total",
        "Submission attempts by route and outcome",
        &["source", "destination", "outcome"]
    ).unwrap();

    pub static ref ATTEMPT_LATENCY: Histogram = register_histogram!(
        "xcm_relay_attempt_latency_seconds",
        "Time spent on one attempt, backoff excluded",
        vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    pub static ref BACKOFFS: Counter = register_counter!(
        "xcm_relay_backoffs_total",
        "Backoff sleeps between attempts"
    ).unwrap();

    pub static ref DRY_RUN_FAILURES: Counter = register_counter!(
        "xcm_relay_dry_run_failures_total",
        "Dry runs that reported a failing leg"
    ).unwrap();

    // Run metrics
    pub static ref SUBMISSIONS: CounterVec = register_counter_vec!(
        "xcm_relay_submissions_total",
        "Transfers accepted by the signer",
        &["source", "destination", "asset"]
    ).unwrap();

    pub static ref EXHAUSTED: CounterVec = register_counter_vec!(
        "xcm_relay_exhausted_total",
        "Runs that used up every attempt",
        &["source", "destination", "asset"]
    ).unwrap();

    // Quote metrics
    pub static ref QUOTES: CounterVec = register_counter_vec!(
        "xcm_relay_quotes_total",
        "Quotes served by chain",
        &["chain"]
    ).unwrap();
}

pub fn record_attempt(route: &RouteDescriptor, outcome: &str) {
    ATTEMPTS
        .with_label_values(&[
            route.source_chain.name(),
            route.destination_chain.name(),
            outcome,
        ])
        .inc();
}

pub fn record_attempt_latency(latency_secs: f64) {
    ATTEMPT_LATENCY.observe(latency_secs);
}

pub fn record_backoff() {
    BACKOFFS.inc();
}

pub fn record_dry_run_failure() {
    DRY_RUN_FAILURES.inc();
}

pub fn record_submission(route: &RouteDescriptor) {
    SUBMISSIONS.with_label_values(&route_labels(route)).inc();
}

pub fn record_exhausted(route: &RouteDescriptor) {
    EXHAUSTED.with_label_values(&route_labels(route)).inc();
}

pub fn record_quote(chain: Chain) {
    QUOTES.with_label_values(&[chain.name()]).inc();
}

fn route_labels(route: &RouteDescriptor) -> [&str; 3] {
    [
        route.source_chain.name(),
        route.destination_chain.name(),
        route.asset_symbol.as_str(),
    ]
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

/// Write the registry to `path`, replacing it atomically via a sibling temp file
pub fn write_textfile(path: &Path) -> Result<()> {
    let rendered = render()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, rendered)
        .with_context(|| format!("Failed to write metrics to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;

    info!("Metrics written to {}", path.display());
    Ok(())
}

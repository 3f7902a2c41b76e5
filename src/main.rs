//! XCM Relay - resilient cross-chain transfer submission
//!
//! Builds a cross-chain asset transfer, previews it with a dry run, and hands
//! it to a signing service, retrying across a pool of RPC endpoints until the
//! transfer is accepted or the attempt budget runs out.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod chain;
mod config;
mod error;
mod metrics;
mod quote;
mod secret;
mod transfer;
mod xcm;

use chain::{Chain, EndpointPool};
use config::Settings;
use quote::{HttpRouteQuoter, QuoteService, StaticAssetRegistry};
use xcm::{RemoteSigner, XcmApiBuilder, XcmApiClient};

#[derive(Parser)]
#[command(name = "xcm-relay")]
#[command(about = "Cross-chain transfer submission with endpoint failover", version)]
struct Cli {
    /// TOML config file; falls back to config/default.toml
    #[arg(long, global = true, env = "XCM_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Submit the configured transfer and print its transaction id (default)
    Transfer,
    /// Quote a sell on the router chain and print it as JSON
    Quote {
        #[arg(long)]
        token_in: String,
        #[arg(long)]
        token_out: String,
        #[arg(long)]
        amount: String,
        /// Override `quote.chain`
        #[arg(long)]
        chain: Option<Chain>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!("Starting XCM Relay v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.config.as_deref())?;

    let outcome = match cli.command.unwrap_or(Command::Transfer) {
        Command::Transfer => submit_transfer(&settings).await,
        Command::Quote {
            token_in,
            token_out,
            amount,
            chain,
        } => print_quote(&settings, chain, &token_in, &token_out, &amount).await,
    };

    if let Some(path) = &settings.metrics.textfile_path {
        if let Err(e) = metrics::write_textfile(path) {
            error!("Failed to write metrics: {:#}", e);
        }
    }

    outcome
}

async fn submit_transfer(settings: &Settings) -> Result<()> {
    let credential = settings.require_credential()?.clone();

    let pool = Arc::new(EndpointPool::from_settings(settings)?);
    info!(
        "Endpoint pool: {} {} endpoints, {} {} endpoints",
        pool.pool_size(settings.transfer.source_chain),
        settings.transfer.source_chain,
        pool.pool_size(settings.transfer.destination_chain),
        settings.transfer.destination_chain
    );

    let registry = Arc::new(StaticAssetRegistry::from_settings(settings)?);
    let api = Arc::new(XcmApiClient::new(&settings.xcm_api)?);
    let builder = Arc::new(XcmApiBuilder::new(
        api,
        registry,
        Duration::from_millis(settings.xcm_api.connect_timeout_ms),
    ));
    let signer = Arc::new(RemoteSigner::new(&settings.signer, credential)?);

    let receipt = transfer::run_transfer(settings, pool, builder, signer).await?;
    info!(
        "Transfer {} accepted at {} after {} attempt(s) via {} -> {}",
        receipt.tx_id,
        receipt.submitted_at.to_rfc3339(),
        receipt.attempts,
        receipt.source_endpoint,
        receipt.destination_endpoint
    );

    println!("{}", receipt.tx_id);
    Ok(())
}

async fn print_quote(
    settings: &Settings,
    chain: Option<Chain>,
    token_in: &str,
    token_out: &str,
    amount: &str,
) -> Result<()> {
    let chain = chain.unwrap_or(settings.quote.chain);
    let registry = Arc::new(StaticAssetRegistry::from_settings(settings)?);
    let quoter = Arc::new(HttpRouteQuoter::new(&settings.quote)?);

    let record = QuoteService::new(chain, registry, quoter)
        .quote(token_in, token_out, amount)
        .await?;

    let json = serde_json::to_string_pretty(&record).context("Failed to serialize quote")?;
    println!("{}", json);
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,xcm_relay=debug,hyper=warn,reqwest=warn")
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // stdout carries the result only
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

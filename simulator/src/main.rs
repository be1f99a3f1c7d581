//! RateStream Simulator
//!
//! Runs the whole pipeline in one process against a synthetic rate source.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod metrics;
mod source;

use controller::SimulationController;
use source::RandomWalkSource;

/// RateStream Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Local end-to-end simulation of the ratestream pipeline")]
struct Args {
    /// Pairs to stream, e.g. USD:EUR,GBP:JPY
    #[arg(short, long, default_value = "USD:EUR,GBP:JPY,EUR:CHF")]
    pairs: String,

    /// Stream interval in seconds (raised to 60 if lower)
    #[arg(short, long, default_value = "60")]
    interval: u64,

    /// Largest relative rate move per fetch
    #[arg(long, default_value = "0.002")]
    volatility: f64,

    /// Probability that a single fetch fails
    #[arg(long, default_value = "0.0")]
    failure_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds between cache reports
    #[arg(long, default_value = "15")]
    report_every: u64,

    /// Run duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting RateStream Simulator");
    info!("Pairs: {}", args.pairs);
    info!("Volatility: {}, failure rate: {}", args.volatility, args.failure_rate);

    let source = Arc::new(RandomWalkSource::new(
        args.seed,
        args.volatility,
        args.failure_rate,
    ));
    let controller = SimulationController::new(source);
    controller.start_stream(&args.pairs, args.interval)?;

    let duration = if args.duration > 0 {
        Some(Duration::from_secs(args.duration))
    } else {
        info!("Press Ctrl+C to stop");
        None
    };

    let report = controller
        .run(duration, Duration::from_secs(args.report_every.max(1)))
        .await?;

    info!("Simulation complete");
    info!("Cycles: {}", report.pipeline.cycles_total);
    info!("Published: {}", report.pipeline.packages_published);
    info!("Skipped empty: {}", report.pipeline.packages_skipped_empty);
    info!("Pair failures: {}", report.pipeline.pair_fetch_failures);
    info!("Consumed: {}", report.consumer.consumed);
    info!("Publish rate: {:.2}", report.publish_rate());
    info!("Consumer lag: {}", report.consumer_lag());
    if let Some(package) = &report.last_package {
        info!("Last package at {} with {} rates", package.time(), package.len());
    }

    Ok(())
}

use anyhow::Result;
use bucket_gate::config::Config;
use bucket_gate::limiter::TokenBucketLimiter;
use bucket_gate::simulation::run_simulation;
use clap::Parser;
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drive a shared token bucket with concurrent workers and report admissions
#[derive(Debug, Parser)]
#[command(name = "bucket-gate", version, about)]
struct Cli {
    /// JSON configuration file; environment variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bucket capacity in tokens
    #[arg(long)]
    capacity: Option<f64>,

    /// Refill rate in tokens per second
    #[arg(long)]
    rate: Option<f64>,

    /// Concurrent workers per round
    #[arg(short, long)]
    workers: Option<usize>,

    /// Tokens each worker requests
    #[arg(short, long)]
    tokens: Option<f64>,

    #[arg(short, long)]
    rounds: Option<u32>,

    /// Delay before each worker requests, e.g. "1s" or "250ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    start_delay: Option<Duration>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(capacity) = self.capacity {
            config.limiter.capacity = capacity;
        }
        if let Some(rate) = self.rate {
            config.limiter.refill_rate = rate;
        }
        if let Some(workers) = self.workers {
            config.simulation.workers = workers;
        }
        if let Some(tokens) = self.tokens {
            config.simulation.tokens_per_request = tokens;
        }
        if let Some(rounds) = self.rounds {
            config.simulation.rounds = rounds;
        }
        if let Some(delay) = self.start_delay {
            config.simulation.start_delay = delay;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path),
        None => Config::from_env(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    cli.apply(&mut config);
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bucket_gate={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        capacity = config.limiter.capacity,
        refill_rate = config.limiter.refill_rate,
        workers = config.simulation.workers,
        rounds = config.simulation.rounds,
        "Starting simulation"
    );

    let limiter = TokenBucketLimiter::from_config(&config.limiter)?;
    let report = run_simulation(&limiter, &config.simulation).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for round in &report.rounds {
            println!(
                "round {}: {} admitted, {} rejected",
                round.round, round.admitted, round.rejected
            );
        }
        println!(
            "total: {} admitted, {} rejected, {:.2} tokens left",
            report.total_admitted(),
            report.total_rejected(),
            report.final_level
        );
    }

    Ok(())
}

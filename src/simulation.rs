//! Concurrent workers sharing one limiter.
//!
//! Each round spawns `workers` tasks against the same injected limiter; every
//! task waits `start_delay` and then asks for `tokens_per_request` tokens. The
//! report shows how many were admitted, which never exceeds what the bucket
//! could hand out over the run.

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::{LimiterError, LimiterResult};
use crate::limiter::TokenBucketLimiter;
use crate::metrics::MetricsSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    pub round: u32,
    pub admitted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub rounds: Vec<RoundReport>,
    pub metrics: MetricsSnapshot,
    pub final_level: f64,
}

impl SimulationReport {
    pub fn total_admitted(&self) -> usize {
        self.rounds.iter().map(|r| r.admitted).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.rounds.iter().map(|r| r.rejected).sum()
    }
}

pub async fn run_simulation(
    limiter: &TokenBucketLimiter,
    config: &SimulationConfig,
) -> LimiterResult<SimulationReport> {
    let mut rounds = Vec::with_capacity(config.rounds as usize);

    for round in 1..=config.rounds {
        if round > 1 {
            tokio::time::sleep(config.round_interval).await;
        }

        let report = run_round(limiter, config, round).await?;
        info!(
            round,
            admitted = report.admitted,
            rejected = report.rejected,
            "Round finished"
        );
        rounds.push(report);
    }

    Ok(SimulationReport {
        rounds,
        metrics: limiter.metrics(),
        final_level: limiter.available_tokens().await,
    })
}

async fn run_round(
    limiter: &TokenBucketLimiter,
    config: &SimulationConfig,
    round: u32,
) -> LimiterResult<RoundReport> {
    let mut workers = JoinSet::new();

    for worker_id in 0..config.workers {
        let limiter = limiter.clone();
        let delay = config.start_delay;
        let tokens = config.tokens_per_request;

        workers.spawn(async move {
            tokio::time::sleep(delay).await;
            let admitted = limiter.try_consume(tokens).await?;
            debug!(round, worker_id, admitted, "Worker finished");
            Ok::<bool, LimiterError>(admitted)
        });
    }

    let mut report = RoundReport {
        round,
        admitted: 0,
        rejected: 0,
    };

    while let Some(joined) = workers.join_next().await {
        let admitted = joined
            .map_err(|e| LimiterError::Internal(format!("worker task failed: {}", e)))??;
        if admitted {
            report.admitted += 1;
        } else {
            report.rejected += 1;
        }
    }

    Ok(report)
}

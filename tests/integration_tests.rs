use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::advance;

use bucket_gate::{
    config::{Config, LimiterConfig, SimulationConfig},
    simulation::run_simulation,
    LimiterError, TokenBucket, TokenBucketLimiter,
};

/// Middleware-style caller that owns an injected limiter.
struct Handler {
    limiter: TokenBucketLimiter,
}

impl Handler {
    async fn handle(&self) -> u16 {
        match self.limiter.try_consume(1.0).await {
            Ok(true) => 200,
            Ok(false) => 429,
            Err(_) => 400,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_example_scenario() {
    let limiter = TokenBucketLimiter::new(5.0, 5.0).unwrap();

    assert!(limiter.try_consume(5.0).await.unwrap());
    assert_eq!(limiter.snapshot().await.level, 0.0);

    advance(Duration::from_secs(1)).await;
    assert_eq!(limiter.available_tokens().await, 5.0);
    assert!(limiter.try_consume(5.0).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_refill_grows_by_min_of_gap_and_rate() {
    let limiter = TokenBucketLimiter::new(10.0, 4.0).unwrap();
    assert!(limiter.try_consume(9.0).await.unwrap());

    advance(Duration::from_millis(250)).await;
    assert_eq!(limiter.available_tokens().await, 2.0);

    advance(Duration::from_secs(5)).await;
    assert_eq!(limiter.available_tokens().await, 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_rejection_deducts_nothing() {
    let limiter = TokenBucketLimiter::new(3.0, 1.0).unwrap();
    assert!(limiter.try_consume(2.0).await.unwrap());

    assert!(!limiter.try_consume(2.0).await.unwrap());
    assert_eq!(limiter.available_tokens().await, 1.0);
    assert!(limiter.try_consume(1.0).await.unwrap());
}

#[tokio::test]
async fn test_configuration_errors() {
    let err = TokenBucketLimiter::new(0.0, 5.0).unwrap_err();
    assert!(matches!(err, LimiterError::Configuration(_)));

    let err = TokenBucketLimiter::from_config(&LimiterConfig::new(5.0, -1.0)).unwrap_err();
    assert!(matches!(err, LimiterError::Configuration(_)));

    assert!(TokenBucket::new(1.0, f64::NAN).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_callers_released_together() {
    let limiter = TokenBucketLimiter::new(5.0, 1e-9).unwrap();
    let callers = 10;
    let barrier = Arc::new(Barrier::new(callers));

    let mut tasks = JoinSet::new();
    for _ in 0..callers {
        let limiter = limiter.clone();
        let barrier = barrier.clone();
        tasks.spawn(async move {
            barrier.wait().await;
            limiter.try_consume(1.0).await.unwrap()
        });
    }

    let mut admitted = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 5);
    let metrics = limiter.metrics();
    assert_eq!(metrics.admitted, 5);
    assert_eq!(metrics.rejected, 5);
    assert!(limiter.available_tokens().await < 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_level_never_negative_under_contention() {
    let limiter = TokenBucketLimiter::new(20.0, 50.0).unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..200u32 {
        let limiter = limiter.clone();
        tasks.spawn(async move {
            let tokens = f64::from(i % 3 + 1);
            limiter.try_consume(tokens).await.unwrap();
            let level = limiter.snapshot().await.level;
            assert!((0.0..=20.0).contains(&level), "level {} out of bounds", level);
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }
    assert_eq!(limiter.metrics().total_requests, 200);
}

#[tokio::test(start_paused = true)]
async fn test_injected_limiter_shared_by_handlers() {
    let limiter = TokenBucketLimiter::new(2.0, 1.0).unwrap();
    let first = Handler { limiter: limiter.clone() };
    let second = Handler { limiter };

    assert_eq!(first.handle().await, 200);
    assert_eq!(second.handle().await, 200);
    assert_eq!(first.handle().await, 429);

    advance(Duration::from_secs(1)).await;
    assert_eq!(second.handle().await, 200);
}

#[tokio::test(start_paused = true)]
async fn test_simulation_from_config() {
    let config = Config {
        limiter: LimiterConfig::new(5.0, 5.0),
        simulation: SimulationConfig {
            workers: 10,
            tokens_per_request: 1.0,
            rounds: 2,
            start_delay: Duration::from_millis(100),
            round_interval: Duration::from_secs(1),
        },
        ..Config::default()
    };
    config.validate().unwrap();

    let limiter = TokenBucketLimiter::from_config(&config.limiter).unwrap();
    let report = run_simulation(&limiter, &config.simulation).await.unwrap();

    assert_eq!(report.rounds.len(), 2);
    assert_eq!(report.rounds[0].admitted, 5);
    assert_eq!(report.rounds[1].admitted, 5);
    assert_eq!(report.total_rejected(), 10);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["metrics"]["admitted"], 10);
}

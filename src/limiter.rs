use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::LimiterConfig;
use crate::error::LimiterResult;
use crate::metrics::{AdmissionMetrics, MetricsSnapshot};
use crate::token_bucket::{BucketSnapshot, TokenBucket};

/// Shareable token bucket limiter.
///
/// Clones share the same bucket, so a caller builds one limiter and hands
/// clones to whichever handlers need admission control. Every operation that
/// touches the level holds the bucket lock for its whole refill/check/update
/// sequence; waiting callers are suspended rather than blocking a thread.
#[derive(Clone, Debug)]
pub struct TokenBucketLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
    metrics: Arc<AdmissionMetrics>,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucketLimiter {
    pub fn new(capacity: f64, refill_rate: f64) -> LimiterResult<Self> {
        let bucket = TokenBucket::new(capacity, refill_rate)?;

        info!(capacity, refill_rate, "Created token bucket limiter");

        Ok(Self {
            bucket: Arc::new(Mutex::new(bucket)),
            metrics: Arc::new(AdmissionMetrics::new()),
            capacity,
            refill_rate,
        })
    }

    pub fn from_config(config: &LimiterConfig) -> LimiterResult<Self> {
        config.validate_limits()?;
        Self::new(config.capacity, config.refill_rate)
    }

    /// Admit the request if `tokens` are available, taking them all or none.
    ///
    /// `Ok(false)` is a rejection; the caller decides whether to retry later.
    pub async fn try_consume(&self, tokens: f64) -> LimiterResult<bool> {
        let mut bucket = self.bucket.lock().await;

        let admitted = match bucket.try_consume(tokens) {
            Ok(admitted) => admitted,
            Err(err) => {
                self.metrics.record_invalid();
                warn!(tokens, error = %err, "Rejected invalid token request");
                return Err(err);
            }
        };
        let level = bucket.level();
        drop(bucket);

        self.metrics.record_decision(admitted);
        if admitted {
            debug!(tokens, level, "Admitted request");
        } else {
            debug!(tokens, level, "Rejected request, insufficient tokens");
        }

        Ok(admitted)
    }

    pub async fn available_tokens(&self) -> f64 {
        self.bucket.lock().await.available_tokens()
    }

    /// Wait hint for callers that want to retry, `None` if `tokens` are available now.
    pub async fn time_until_available(&self, tokens: f64) -> LimiterResult<Option<Duration>> {
        self.bucket.lock().await.time_until_available(tokens)
    }

    pub async fn reset(&self) {
        self.bucket.lock().await.reset();
        debug!(capacity = self.capacity, "Reset bucket to capacity");
    }

    pub async fn snapshot(&self) -> BucketSnapshot {
        self.bucket.lock().await.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

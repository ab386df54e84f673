use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::error::{LimiterError, LimiterResult};

/// Token bucket state without any synchronization.
///
/// `level` stays within `[0, capacity]` and `last_refill` never moves
/// backwards. Shared access goes through [`crate::limiter::TokenBucketLimiter`].
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    level: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

/// Point-in-time view of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketSnapshot {
    pub capacity: f64,
    pub refill_rate: f64,
    pub level: f64,
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> LimiterResult<Self> {
        Self::new_at(capacity, refill_rate, Instant::now())
    }

    pub(crate) fn new_at(capacity: f64, refill_rate: f64, now: Instant) -> LimiterResult<Self> {
        if !is_positive(capacity) {
            return Err(LimiterError::Configuration(format!(
                "capacity must be a finite number greater than 0, got {}",
                capacity
            )));
        }
        if !is_positive(refill_rate) {
            return Err(LimiterError::Configuration(format!(
                "refill rate must be a finite number greater than 0, got {}",
                refill_rate
            )));
        }

        Ok(Self {
            capacity,
            level: capacity,
            refill_rate,
            last_refill: now,
        })
    }

    /// Refill, then take `tokens` if they are all available.
    ///
    /// Returns `Ok(false)` without touching the level when the bucket is short.
    pub fn try_consume(&mut self, tokens: f64) -> LimiterResult<bool> {
        self.try_consume_at(tokens, Instant::now())
    }

    pub(crate) fn try_consume_at(&mut self, tokens: f64, now: Instant) -> LimiterResult<bool> {
        validate_tokens(tokens)?;
        self.refill_at(now);

        if self.level >= tokens {
            self.level -= tokens;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn available_tokens(&mut self) -> f64 {
        self.available_tokens_at(Instant::now())
    }

    pub(crate) fn available_tokens_at(&mut self, now: Instant) -> f64 {
        self.refill_at(now);
        self.level
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Level as of the last refill, without refilling.
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// How long until `tokens` could be taken, or `None` if they are available now.
    pub fn time_until_available(&mut self, tokens: f64) -> LimiterResult<Option<Duration>> {
        self.time_until_available_at(tokens, Instant::now())
    }

    pub(crate) fn time_until_available_at(
        &mut self,
        tokens: f64,
        now: Instant,
    ) -> LimiterResult<Option<Duration>> {
        validate_tokens(tokens)?;
        if tokens > self.capacity {
            return Err(LimiterError::InvalidRequest(format!(
                "{} tokens exceeds bucket capacity {}",
                tokens, self.capacity
            )));
        }

        self.refill_at(now);

        if self.level >= tokens {
            return Ok(None);
        }

        let seconds_to_wait = (tokens - self.level) / self.refill_rate;
        Ok(Some(
            Duration::try_from_secs_f64(seconds_to_wait).unwrap_or(Duration::MAX),
        ))
    }

    /// Fill the bucket back to capacity.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub(crate) fn reset_at(&mut self, now: Instant) {
        self.level = self.capacity;
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    pub fn snapshot(&mut self) -> BucketSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn snapshot_at(&mut self, now: Instant) -> BucketSnapshot {
        self.refill_at(now);
        BucketSnapshot {
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            level: self.level,
        }
    }

    fn refill_at(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let tokens_to_add = self.refill_rate * elapsed.as_secs_f64();

        self.level = (self.level + tokens_to_add).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }

        trace!(
            level = self.level,
            capacity = self.capacity,
            elapsed_secs = elapsed.as_secs_f64(),
            "Refilled bucket"
        );
    }
}

fn validate_tokens(tokens: f64) -> LimiterResult<()> {
    if is_positive(tokens) {
        Ok(())
    } else {
        Err(LimiterError::InvalidRequest(format!(
            "tokens must be a finite number greater than 0, got {}",
            tokens
        )))
    }
}

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters for the admission decisions a limiter has made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub admitted: u64,
    pub rejected: u64,
    pub invalid: u64,
    pub last_reset: u64,
}

#[derive(Debug)]
pub struct AdmissionMetrics {
    total_requests: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    invalid: AtomicU64,
    last_reset: AtomicU64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            last_reset: AtomicU64::new(unix_now()),
        }
    }

    pub fn record_decision(&self, admitted: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if admitted {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Invalid requests are not admission decisions and only count here.
    pub fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            last_reset: self.last_reset.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.admitted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.invalid.store(0, Ordering::Relaxed);
        self.last_reset.store(unix_now(), Ordering::Relaxed);
    }
}

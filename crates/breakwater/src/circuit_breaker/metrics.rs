//! Circuit breaker metrics.
//!
//! Counters for admission decisions and state transitions, cheap enough to
//! update inside the breaker's critical section.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters tracking a breaker's admission decisions and transitions.
#[derive(Debug, Default)]
pub struct BreakerMetrics {
    /// Total number of successful guarded calls
    successes: AtomicU64,
    /// Total number of failed guarded calls
    failures: AtomicU64,
    /// Total number of rejected calls (circuit open)
    rejected: AtomicU64,
    /// Number of state transitions
    transitions: AtomicU64,
}

impl BreakerMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Total successful guarded calls.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Total failed guarded calls.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Total calls rejected while the circuit was open.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Total state transitions.
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Total calls that reached the guarded operation.
    pub fn requests(&self) -> u64 {
        self.successes() + self.failures()
    }

    /// Failure rate as a percentage of attempted calls (0-100).
    pub fn failure_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            return 0.0;
        }
        (self.failures() as f64 / total as f64) * 100.0
    }

    /// Take a serializable snapshot of the current counters.
    pub fn snapshot(&self) -> BreakerMetricsSnapshot {
        BreakerMetricsSnapshot {
            successes: self.successes(),
            failures: self.failures(),
            rejected: self.rejected(),
            requests: self.requests(),
            failure_rate: self.failure_rate(),
            transitions: self.transitions(),
        }
    }
}

/// Serializable metrics for monitoring/display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerMetricsSnapshot {
    /// Total successful guarded calls
    pub successes: u64,
    /// Total failed guarded calls
    pub failures: u64,
    /// Total rejected calls
    pub rejected: u64,
    /// Total attempted calls
    pub requests: u64,
    /// Failure rate percentage
    pub failure_rate: f64,
    /// Number of state transitions
    pub transitions: u64,
}

impl std::fmt::Display for BreakerMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} successes={} failures={} rejected={} failure_rate={:.2}% transitions={}",
            self.requests,
            self.successes,
            self.failures,
            self.rejected,
            self.failure_rate,
            self.transitions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = BreakerMetrics::new();
        assert_eq!(metrics.requests(), 0);
        assert_eq!(metrics.failure_rate(), 0.0);
    }

    #[test]
    fn test_record_and_rate() {
        let metrics = BreakerMetrics::new();
        metrics.record_failure();
        metrics.record_failure();
        metrics.record_success();

        assert_eq!(metrics.requests(), 3);
        assert!((metrics.failure_rate() - 66.67).abs() < 0.1);
    }

    #[test]
    fn test_rejected_not_counted_as_request() {
        let metrics = BreakerMetrics::new();
        metrics.record_rejected();

        assert_eq!(metrics.rejected(), 1);
        assert_eq!(metrics.requests(), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = BreakerMetrics::new();
        metrics.record_success();
        metrics.record_rejected();

        let snapshot = metrics.snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["successes"], 1);
        assert_eq!(json["rejected"], 1);
    }
}

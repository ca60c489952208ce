//! Atomic counters for session metrics
//!
//! Lock-free counters that can be safely updated from any thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();

/// Atomic metrics counters
pub struct Metrics {
    // Request metrics
    pub connect_requests: AtomicU64,
    pub validation_rejections: AtomicU64,
    pub busy_rejections: AtomicU64,

    // Tunnel outcome metrics
    pub connects_established: AtomicU64,
    pub tunnel_failures: AtomicU64,
    pub disconnects_completed: AtomicU64,
    pub stale_events: AtomicU64,

    // Presentation metrics
    pub subscriber_failures: AtomicU64,
    pub grace_clears: AtomicU64,
    pub grace_clears_cancelled: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            connect_requests: AtomicU64::new(0),
            validation_rejections: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
            connects_established: AtomicU64::new(0),
            tunnel_failures: AtomicU64::new(0),
            disconnects_completed: AtomicU64::new(0),
            stale_events: AtomicU64::new(0),
            subscriber_failures: AtomicU64::new(0),
            grace_clears: AtomicU64::new(0),
            grace_clears_cancelled: AtomicU64::new(0),
        }
    }

    // Request tracking
    #[inline]
    pub fn connect_requested(&self) {
        self.connect_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn validation_rejected(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn busy_rejected(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    // Outcome tracking
    #[inline]
    pub fn connect_established(&self) {
        self.connects_established.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn tunnel_failed(&self) {
        self.tunnel_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn disconnect_completed(&self) {
        self.disconnects_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn stale_event(&self) {
        self.stale_events.fetch_add(1, Ordering::Relaxed);
    }

    // Presentation tracking
    #[inline]
    pub fn subscriber_failed(&self) {
        self.subscriber_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn grace_cleared(&self) {
        self.grace_clears.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn grace_clear_cancelled(&self) {
        self.grace_clears_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_requests: self.connect_requests.load(Ordering::Relaxed),
            validation_rejections: self.validation_rejections.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            connects_established: self.connects_established.load(Ordering::Relaxed),
            tunnel_failures: self.tunnel_failures.load(Ordering::Relaxed),
            disconnects_completed: self.disconnects_completed.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            subscriber_failures: self.subscriber_failures.load(Ordering::Relaxed),
            grace_clears: self.grace_clears.load(Ordering::Relaxed),
            grace_clears_cancelled: self.grace_clears_cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics for reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub connect_requests: u64,
    pub validation_rejections: u64,
    pub busy_rejections: u64,
    pub connects_established: u64,
    pub tunnel_failures: u64,
    pub disconnects_completed: u64,
    pub stale_events: u64,
    pub subscriber_failures: u64,
    pub grace_clears: u64,
    pub grace_clears_cancelled: u64,
}

impl MetricsSnapshot {
    /// Named counter values, in a fixed order
    pub fn counters(&self) -> [(&'static str, u64); 10] {
        [
            ("connect_requests", self.connect_requests),
            ("validation_rejections", self.validation_rejections),
            ("busy_rejections", self.busy_rejections),
            ("connects_established", self.connects_established),
            ("tunnel_failures", self.tunnel_failures),
            ("disconnects_completed", self.disconnects_completed),
            ("stale_events", self.stale_events),
            ("subscriber_failures", self.subscriber_failures),
            ("grace_clears", self.grace_clears),
            ("grace_clears_cancelled", self.grace_clears_cancelled),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_counters() {
        let metrics = Metrics::new();
        metrics.connect_requested();
        metrics.connect_requested();
        metrics.stale_event();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connect_requests, 2);
        assert_eq!(snapshot.stale_events, 1);
        assert_eq!(snapshot.tunnel_failures, 0);
        assert_eq!(snapshot.counters()[0], ("connect_requests", 2));
    }
}

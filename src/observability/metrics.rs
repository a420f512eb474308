//! Consensus metrics
//!
//! - Counters only, monotonic
//! - Relaxed atomics; exactness across threads is not required

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters owned by one consensus instance
#[derive(Debug, Default)]
pub struct ConsensusMetrics {
    rounds_created: AtomicU64,
    rounds_notified: AtomicU64,
    double_notifications: AtomicU64,
    term_fence_aborts: AtomicU64,
    hooks_executed: AtomicU64,
    hook_failures: AtomicU64,
}

impl ConsensusMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_rounds_created(&self) {
        self.rounds_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rounds_notified(&self) {
        self.rounds_notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_double_notifications(&self) {
        self.double_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_term_fence_aborts(&self) {
        self.term_fence_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_hooks_executed(&self) {
        self.hooks_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_hook_failures(&self) {
        self.hook_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_created: self.rounds_created.load(Ordering::Relaxed),
            rounds_notified: self.rounds_notified.load(Ordering::Relaxed),
            double_notifications: self.double_notifications.load(Ordering::Relaxed),
            term_fence_aborts: self.term_fence_aborts.load(Ordering::Relaxed),
            hooks_executed: self.hooks_executed.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub rounds_created: u64,
    pub rounds_notified: u64,
    pub double_notifications: u64,
    pub term_fence_aborts: u64,
    pub hooks_executed: u64,
    pub hook_failures: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

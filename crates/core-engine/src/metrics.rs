//! Engine counters.
//!
//! Counts scheduler-level decisions (what the engine asked for and what came
//! back). Cache-internal counters live on `RowCache` and coordinator counters
//! on `FetchCoordinator`; the three are kept apart so a snapshot can show the
//! intent next to the outcome.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub fetches_issued: AtomicU64,
    /// Pending fetches cancelled by a disjoint need or shutdown.
    pub fetches_cancelled: AtomicU64,
    /// Failures that scheduled a backoff retry.
    pub fetches_failed: AtomicU64,
    /// Failures that hit the retry ceiling.
    pub terminal_failures: AtomicU64,
    pub rows_merged: AtomicU64,
    pub rows_evicted: AtomicU64,
    pub renders: AtomicU64,
    pub reconcile_passes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub fetches_issued: u64,
    pub fetches_cancelled: u64,
    pub fetches_failed: u64,
    pub terminal_failures: u64,
    pub rows_merged: u64,
    pub rows_evicted: u64,
    pub renders: u64,
    pub reconcile_passes: u64,
}

impl EngineMetrics {
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            fetches_issued: self.fetches_issued.load(Ordering::Relaxed),
            fetches_cancelled: self.fetches_cancelled.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            terminal_failures: self.terminal_failures.load(Ordering::Relaxed),
            rows_merged: self.rows_merged.load(Ordering::Relaxed),
            rows_evicted: self.rows_evicted.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            reconcile_passes: self.reconcile_passes.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

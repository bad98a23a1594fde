//! Per-range retry bookkeeping.
//!
//! Records are keyed by the literal bounds of the failed request. A request
//! for different bounds (even one covering the same rows) starts with no
//! history; overlapping re-requests are not rate-limited by earlier failures.

use core_range::RowRange;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay` (`attempt × base delay`).
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached; the record has been dropped.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct RetryTracker {
    max_retries: u32,
    base_delay: Duration,
    failures: HashMap<RowRange, u32>,
}

impl RetryTracker {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            failures: HashMap::new(),
        }
    }

    /// Count a failure for `range` and decide what happens next.
    pub fn record_failure(&mut self, range: RowRange) -> RetryDecision {
        let count = self.failures.entry(range).or_insert(0);
        *count += 1;
        let attempt = *count;
        if attempt >= self.max_retries {
            self.failures.remove(&range);
            warn!(
                target: "fetch.retry",
                %range,
                attempts = attempt,
                "retry_ceiling_reached"
            );
            return RetryDecision::Exhausted { attempts: attempt };
        }
        let delay = self.base_delay.saturating_mul(attempt);
        debug!(
            target: "fetch.retry",
            %range,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retry_scheduled"
        );
        RetryDecision::Retry { attempt, delay }
    }

    /// Forget `range` after a success. Returns whether a record existed.
    pub fn clear(&mut self, range: RowRange) -> bool {
        self.failures.remove(&range).is_some()
    }

    /// Forget every record whose rows all lie inside `range`. Returns how
    /// many were dropped.
    pub fn clear_within(&mut self, range: RowRange) -> usize {
        let before = self.failures.len();
        self.failures.retain(|failed, _| !range.covers(failed));
        let cleared = before - self.failures.len();
        if cleared > 0 {
            debug!(target: "fetch.retry", %range, cleared, "retry_records_superseded");
        }
        cleared
    }

    pub fn attempts(&self, range: RowRange) -> u32 {
        self.failures.get(&range).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

//! Single-flight fetch coordinator.
//!
//! At most one retrieval is pending at any time. A request whose covering
//! range overlaps the pending one is absorbed (the caller rechecks after the
//! pending fetch completes); a disjoint request preempts the pending fetch and
//! leaves the slot empty so the next scheduler pass can issue fresh work.

use crate::{CancellationToken, FetchRequest, RetryDecision, RetryTracker};
use core_cache::{Row, RowCache};
use core_events::{FetchError, FetchOutcome, FetchResolution, FetchTicket};
use core_range::RowRange;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Hands a retrieval to whatever executes it. Implementations must eventually
/// deliver exactly one `FetchResolution` carrying `ticket` back to the loop.
pub trait FetchDispatch<P>: Send {
    fn dispatch(&mut self, ticket: FetchTicket, request: FetchRequest, cancel: CancellationToken);
}

#[derive(Debug)]
struct PendingFetch {
    ticket: FetchTicket,
    range: RowRange,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching { ticket: FetchTicket, range: RowRange },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Pending fetch overlaps the request; a recheck is owed after it lands.
    Overlapping { pending: RowRange },
    /// Pending fetch was disjoint and has been cancelled.
    Preempted { cancelled: RowRange },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    NoOp,
    Issued { ticket: FetchTicket, range: RowRange },
    Blocked(BlockReason),
}

impl RequestOutcome {
    pub fn is_issued(&self) -> bool {
        matches!(self, RequestOutcome::Issued { .. })
    }
}

/// Eviction parameters applied after every successful merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrunePlan {
    pub center: usize,
    pub keep_distance: usize,
    pub target_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Resolution did not match the pending ticket.
    Discarded { ticket: FetchTicket },
    Merged {
        range: RowRange,
        merged: usize,
        dropped: usize,
        evicted: usize,
    },
    Cancelled { range: RowRange },
    Retry {
        range: RowRange,
        attempt: u32,
        delay: Duration,
    },
    Terminal {
        range: RowRange,
        attempts: u32,
        error: FetchError,
    },
}

#[derive(Debug, Default)]
struct CoordinatorMetrics {
    issued: AtomicU64,
    absorbed: AtomicU64,
    preempted: AtomicU64,
    discarded: AtomicU64,
    merged_rows: AtomicU64,
    dropped_rows: AtomicU64,
    failures: AtomicU64,
    terminal: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorMetricsSnapshot {
    pub issued: u64,
    pub absorbed: u64,
    pub preempted: u64,
    pub discarded: u64,
    pub merged_rows: u64,
    pub dropped_rows: u64,
    pub failures: u64,
    pub terminal: u64,
}

pub struct FetchCoordinator<P> {
    dispatch: Box<dyn FetchDispatch<P>>,
    pending: Option<PendingFetch>,
    next_ticket: u64,
    recheck_needed: bool,
    retries: RetryTracker,
    total_rows: usize,
    filters: Vec<(String, String)>,
    metrics: CoordinatorMetrics,
}

impl<P> FetchCoordinator<P> {
    pub fn new(
        dispatch: Box<dyn FetchDispatch<P>>,
        total_rows: usize,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            dispatch,
            pending: None,
            next_ticket: 0,
            recheck_needed: false,
            retries: RetryTracker::new(max_retries, retry_delay),
            total_rows,
            filters: Vec::new(),
            metrics: CoordinatorMetrics::default(),
        }
    }

    /// Scope filters attached to every subsequent request.
    pub fn with_filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.set_filters(filters);
        self
    }

    pub fn set_filters(&mut self, filters: Vec<(String, String)>) {
        self.filters = filters;
    }

    pub fn state(&self) -> FetchState {
        match &self.pending {
            None => FetchState::Idle,
            Some(p) => FetchState::Fetching {
                ticket: p.ticket,
                range: p.range,
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    pub fn pending_range(&self) -> Option<RowRange> {
        self.pending.as_ref().map(|p| p.range)
    }

    /// Whether an overlapping request was absorbed by the pending fetch.
    pub fn recheck_needed(&self) -> bool {
        self.recheck_needed
    }

    /// Consume the owed-recheck flag. It survives a failed resolution so the
    /// caller can still honor requests the failed fetch absorbed.
    pub fn take_recheck(&mut self) -> bool {
        std::mem::take(&mut self.recheck_needed)
    }

    /// Drop the failure record for exactly `range`.
    pub fn clear_retry(&mut self, range: RowRange) -> bool {
        self.retries.clear(range)
    }

    pub fn retry_attempts(&self, range: RowRange) -> u32 {
        self.retries.attempts(range)
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn metrics_snapshot(&self) -> CoordinatorMetricsSnapshot {
        let m = &self.metrics;
        CoordinatorMetricsSnapshot {
            issued: m.issued.load(Relaxed),
            absorbed: m.absorbed.load(Relaxed),
            preempted: m.preempted.load(Relaxed),
            discarded: m.discarded.load(Relaxed),
            merged_rows: m.merged_rows.load(Relaxed),
            dropped_rows: m.dropped_rows.load(Relaxed),
            failures: m.failures.load(Relaxed),
            terminal: m.terminal.load(Relaxed),
        }
    }

    /// Request the covering range of `missing` (ascending, possibly empty).
    pub fn request_ranges(&mut self, missing: &[RowRange]) -> RequestOutcome {
        let Some(covering) = RowRange::covering(missing.iter().copied()) else {
            return RequestOutcome::NoOp;
        };
        let covering = covering.clamp_to(self.total_rows);
        if covering.is_empty() {
            return RequestOutcome::NoOp;
        }

        if let Some(pending) = &self.pending
            && pending.range.overlaps(&covering)
        {
            self.recheck_needed = true;
            self.metrics.absorbed.fetch_add(1, Relaxed);
            debug!(
                target: "fetch.coordinator",
                pending = %pending.range,
                requested = %covering,
                "request_absorbed_by_pending"
            );
            return RequestOutcome::Blocked(BlockReason::Overlapping {
                pending: pending.range,
            });
        }

        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            self.recheck_needed = false;
            self.metrics.preempted.fetch_add(1, Relaxed);
            info!(
                target: "fetch.coordinator",
                ticket = %pending.ticket,
                cancelled = %pending.range,
                requested = %covering,
                "pending_fetch_preempted"
            );
            return RequestOutcome::Blocked(BlockReason::Preempted {
                cancelled: pending.range,
            });
        }

        self.issue(covering)
    }

    fn issue(&mut self, range: RowRange) -> RequestOutcome {
        self.next_ticket += 1;
        let ticket = FetchTicket(self.next_ticket);
        let cancel = CancellationToken::new();
        let request = FetchRequest::new(range, self.filters.clone());
        debug!(
            target: "fetch.coordinator",
            %ticket,
            %range,
            start = request.start,
            count = request.count,
            "fetch_issued"
        );
        self.dispatch.dispatch(ticket, request, cancel.clone());
        self.pending = Some(PendingFetch {
            ticket,
            range,
            cancel,
        });
        self.recheck_needed = false;
        self.metrics.issued.fetch_add(1, Relaxed);
        RequestOutcome::Issued { ticket, range }
    }

    /// Cancel the pending fetch, if any, leaving the slot empty.
    pub fn cancel_pending(&mut self) -> Option<RowRange> {
        let pending = self.pending.take()?;
        pending.cancel.cancel();
        self.recheck_needed = false;
        debug!(
            target: "fetch.coordinator",
            ticket = %pending.ticket,
            range = %pending.range,
            "pending_fetch_cancelled"
        );
        Some(pending.range)
    }

    /// Apply a resolution delivered by the dispatcher.
    ///
    /// Successful rows are merged then the cache is pruned around
    /// `prune.center`. Rows outside the requested range or past `total_rows`
    /// are dropped. An empty answer for a non-empty range counts as a failure
    /// so the same gap cannot be re-requested in a tight loop.
    pub fn resolve(
        &mut self,
        resolution: FetchResolution<P>,
        cache: &mut RowCache<P>,
        prune: PrunePlan,
    ) -> Completion {
        let FetchResolution { ticket, outcome } = resolution;
        let Some(pending) = self.pending.take_if(|p| p.ticket == ticket) else {
            self.metrics.discarded.fetch_add(1, Relaxed);
            debug!(
                target: "fetch.coordinator",
                %ticket,
                outcome = outcome.as_str(),
                "stale_resolution_discarded"
            );
            return Completion::Discarded { ticket };
        };
        let range = pending.range;

        if pending.cancel.is_cancelled() {
            self.recheck_needed = false;
            debug!(target: "fetch.coordinator", %ticket, %range, "fetch_cancelled");
            return Completion::Cancelled { range };
        }

        match outcome {
            FetchOutcome::Cancelled => {
                self.recheck_needed = false;
                debug!(target: "fetch.coordinator", %ticket, %range, "fetch_cancelled");
                Completion::Cancelled { range }
            }
            FetchOutcome::Rows(rows) if rows.is_empty() && !range.is_empty() => self.fail(
                ticket,
                range,
                FetchError::Malformed("empty response".to_string()),
            ),
            FetchOutcome::Rows(rows) => self.merge(ticket, range, rows, cache, prune),
            FetchOutcome::Failed(err) => self.fail(ticket, range, err),
        }
    }

    fn merge(
        &mut self,
        ticket: FetchTicket,
        range: RowRange,
        rows: Vec<Row<P>>,
        cache: &mut RowCache<P>,
        prune: PrunePlan,
    ) -> Completion {
        let received = rows.len();
        let total_rows = self.total_rows;
        let accepted = rows.into_iter().filter(|row| {
            let keep = range.contains(row.index) && row.index < total_rows;
            if !keep {
                trace!(target: "fetch.coordinator", index = row.index, %range, "row_out_of_range");
            }
            keep
        });
        let merged = cache.put_rows(accepted);
        let dropped = received - merged;
        if dropped > 0 {
            warn!(
                target: "fetch.coordinator",
                %ticket,
                %range,
                dropped,
                "rows_outside_request_dropped"
            );
        }
        // Records for any bounds inside the merged range are settled too.
        self.retries.clear_within(range);
        self.recheck_needed = false;
        let evicted = cache.prune(prune.center, prune.keep_distance, prune.target_size);
        self.metrics.merged_rows.fetch_add(merged as u64, Relaxed);
        self.metrics.dropped_rows.fetch_add(dropped as u64, Relaxed);
        debug!(
            target: "fetch.coordinator",
            %ticket,
            %range,
            merged,
            evicted,
            cache_len = cache.len(),
            "fetch_merged"
        );
        Completion::Merged {
            range,
            merged,
            dropped,
            evicted,
        }
    }

    fn fail(&mut self, ticket: FetchTicket, range: RowRange, error: FetchError) -> Completion {
        self.metrics.failures.fetch_add(1, Relaxed);
        warn!(
            target: "fetch.coordinator",
            %ticket,
            %range,
            error = %error,
            "fetch_failed"
        );
        match self.retries.record_failure(range) {
            RetryDecision::Retry { attempt, delay } => Completion::Retry {
                range,
                attempt,
                delay,
            },
            RetryDecision::Exhausted { attempts } => {
                self.metrics.terminal.fetch_add(1, Relaxed);
                Completion::Terminal {
                    range,
                    attempts,
                    error,
                }
            }
        }
    }
}

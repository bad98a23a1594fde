//! Deterministic in-process guide provider.
//!
//! Generates channel rows with a day of programs on demand so the engine can
//! be exercised without a backend. Latency and periodic failures are
//! configurable to make the placeholder, cancellation and retry paths visible.

use core_cache::Row;
use core_events::FetchError;
use core_fetch::{CancellationToken, FetchRequest, RowProvider};
use core_range::RowRange;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Filter key shifting the program grid start, in minutes after midnight.
pub const WINDOW_START_FILTER: &str = "window_start";

const PROGRAMS_PER_ROW: usize = 6;
const SLOT_MINUTES: [u32; 4] = [30, 60, 90, 120];
const ADJECTIVES: [&str; 8] = [
    "Morning", "Late", "Weekend", "Breaking", "Classic", "Live", "Family", "Midnight",
];
const NOUNS: [&str; 8] = [
    "News", "Movie", "Report", "Cartoons", "Sports", "Concert", "Documentary", "Talk",
];
const NETWORKS: [&str; 6] = ["Arte", "Nova", "Prime", "Metro", "Vista", "Echo"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub title: String,
    pub start_minute: u32,
    pub stop_minute: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub number: usize,
    pub channel_id: String,
    pub name: String,
    pub programs: Vec<Program>,
}

#[derive(Debug)]
pub struct SyntheticGuide {
    total_rows: usize,
    latency: Duration,
    fail_every: Option<u64>,
    calls: AtomicU64,
}

impl SyntheticGuide {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            latency: Duration::ZERO,
            fail_every: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every `n`th call with a 503. `None` or `Some(0)` never fails.
    pub fn with_failures(mut self, every: Option<u64>) -> Self {
        self.fail_every = every.filter(|n| *n > 0);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn channel(&self, index: usize, window_start: u32) -> ChannelRow {
        let network = NETWORKS[index % NETWORKS.len()];
        let mut start = window_start;
        let programs = (0..PROGRAMS_PER_ROW)
            .map(|k| {
                let length = SLOT_MINUTES[(index * 7 + k * 3) % SLOT_MINUTES.len()];
                let title = format!(
                    "{} {}",
                    ADJECTIVES[(index + k) % ADJECTIVES.len()],
                    NOUNS[(index * 3 + k) % NOUNS.len()]
                );
                let program = Program {
                    title,
                    start_minute: start,
                    stop_minute: start + length,
                };
                start += length;
                program
            })
            .collect();
        ChannelRow {
            number: index + 1,
            channel_id: format!("ch-{:05}", index + 1),
            name: format!("{network} {}", index / NETWORKS.len() + 1),
            programs,
        }
    }

    /// Rows shipped with the first page, before any fetch.
    pub fn initial_rows(&self, range: RowRange) -> Vec<Row<ChannelRow>> {
        range
            .clamp_to(self.total_rows)
            .iter()
            .map(|i| Row::new(i, self.channel(i, 0)))
            .collect()
    }
}

fn window_start(filters: &[(String, String)]) -> u32 {
    filters
        .iter()
        .find(|(k, _)| k == WINDOW_START_FILTER)
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0)
}

impl RowProvider<ChannelRow> for SyntheticGuide {
    async fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancellationToken,
    ) -> Result<Vec<Row<ChannelRow>>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            target: "provider.synthetic",
            call,
            start = request.start,
            count = request.count,
            filters = ?request.filters,
            "fetch_start"
        );
        if !self.latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(FetchError::Transport("request aborted".to_string()));
                }
                _ = tokio::time::sleep(self.latency) => {}
            }
        }
        if let Some(every) = self.fail_every
            && call % every == 0
        {
            warn!(target: "provider.synthetic", call, "injected_failure");
            return Err(FetchError::Status(503));
        }
        let window_start = window_start(&request.filters);
        let rows = request
            .range()
            .clamp_to(self.total_rows)
            .iter()
            .map(|i| Row::new(i, self.channel(i, window_start)))
            .collect();
        Ok(rows)
    }
}

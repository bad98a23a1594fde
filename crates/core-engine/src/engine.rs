//! Guide engine: scheduler and reconciliation over the range calculator,
//! row cache and fetch coordinator.
//!
//! The engine is sans-IO. Every entry point takes the current `Instant`;
//! timers are deadlines the runtime sleeps toward and feeds back as
//! `Event::Timer`. This keeps every scenario reproducible from a plain
//! sequence of `(event, instant)` pairs.

use crate::metrics::{EngineMetrics, EngineMetricsSnapshot};
use crate::reconcile::priority_groups;
use crate::render::{RenderFrame, RowRenderer};
use crate::timers::TimerSet;
use core_cache::{Row, RowCache};
use core_config::GuideSettings;
use core_events::{Event, FetchResolution, Navigation, TimerKind};
use core_fetch::{
    BlockReason, Completion, FetchCoordinator, FetchDispatch, PrunePlan, RequestOutcome,
};
use core_range::{
    DirectionTracker, RangeCalculator, RowHeightMode, RowRange, ScrollDirection, ViewWindow,
};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Viewport dimensions in offset units (terminal columns / lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: usize,
    pub extent: usize,
}

impl Viewport {
    pub fn new(width: usize, extent: usize) -> Self {
        Self { width, extent }
    }
}

/// Whether the control loop should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

pub struct GuideEngine<P> {
    settings: GuideSettings,
    calculator: RangeCalculator,
    mode: RowHeightMode,
    row_height: usize,
    viewport: Viewport,
    scroll_offset: usize,
    direction: DirectionTracker,
    cache: RowCache<P>,
    coordinator: FetchCoordinator<P>,
    timers: TimerSet,
    rendered: RowRange,
    renderer: Box<dyn RowRenderer<P>>,
    started: bool,
    pending_resize: Option<Viewport>,
    seeded: RowRange,
    painted_offset: Option<usize>,
    deferred_retries: Vec<RowRange>,
    metrics: EngineMetrics,
}

impl<P> GuideEngine<P> {
    pub fn new(
        settings: GuideSettings,
        total_rows: usize,
        viewport: Viewport,
        dispatch: Box<dyn FetchDispatch<P>>,
        renderer: Box<dyn RowRenderer<P>>,
    ) -> Self {
        let mode = settings.rows.mode_for(viewport.width);
        let row_height = settings.rows.height(mode);
        let coordinator = FetchCoordinator::new(
            dispatch,
            total_rows,
            settings.max_retries,
            settings.retry_delay,
        );
        Self {
            calculator: RangeCalculator::new(settings.buffer_size, total_rows),
            direction: DirectionTracker::new(settings.direction_threshold, 0),
            mode,
            row_height,
            viewport,
            scroll_offset: 0,
            cache: RowCache::with_capacity(settings.max_cache_size),
            coordinator,
            timers: TimerSet::new(),
            rendered: RowRange::empty(),
            renderer,
            started: false,
            pending_resize: None,
            seeded: RowRange::empty(),
            painted_offset: None,
            deferred_retries: Vec::new(),
            metrics: EngineMetrics::default(),
            settings,
        }
    }

    /// Scope filters forwarded with every retrieval.
    pub fn with_filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.coordinator.set_filters(filters);
        self
    }

    /// Load rows delivered alongside the initial page. Indices past the
    /// universe are ignored.
    pub fn seed<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = Row<P>>,
    {
        let total = self.calculator.total_rows;
        let mut covered = self.seeded;
        let accepted = rows.into_iter().filter(|row| row.index < total).inspect(|row| {
            covered = covered.cover(RowRange::new(row.index, row.index + 1));
        });
        let stored = self.cache.put_rows(accepted);
        self.seeded = covered;
        debug!(
            target: "engine.scheduler",
            stored,
            seeded = %self.seeded,
            "initial_rows_seeded"
        );
    }

    /// Enable scroll-driven behavior.
    ///
    /// When the restored offset puts the first visible row outside the seeded
    /// rows, one reconciliation runs immediately; otherwise the seeded rows
    /// are painted and a settle pass is scheduled for the buffer.
    pub fn start(&mut self, restored_offset: Option<usize>, now: Instant) {
        let offset = restored_offset
            .unwrap_or(self.scroll_offset)
            .min(self.max_offset());
        self.scroll_offset = offset;
        self.direction.reset(offset);
        self.started = true;

        let window = self.window();
        let eager = !self.seeded.contains(window.first_visible);
        info!(
            target: "engine.scheduler",
            offset,
            first_visible = window.first_visible,
            seeded = %self.seeded,
            eager,
            "engine_start"
        );
        if eager {
            self.reconcile(now);
        } else {
            self.rendered = window.desired;
            self.render();
            self.timers
                .arm(TimerKind::Settle, now + self.settings.settle_debounce);
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn handle(&mut self, event: Event<P>, now: Instant) -> Flow {
        trace!(target: "engine.scheduler", kind = event.kind(), "event");
        match event {
            Event::Scroll { offset } => self.scroll_to(offset, now),
            Event::Navigate(nav) => self.navigate(nav, now),
            Event::Resize { width, height } => self.resize(Viewport::new(width, height), now),
            Event::Fetch(resolution) => self.complete(resolution, now),
            Event::Timer(kind) => self.fire(kind, now),
            Event::Tick => self.render(),
            Event::Shutdown => {
                self.shutdown();
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    /// Fire every timer due at `now`, earliest first.
    pub fn advance(&mut self, now: Instant) {
        while let Some(kind) = self.timers.pop_due(now) {
            self.fire(kind, now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Cancel any in-flight retrieval and drop every pending timer.
    pub fn shutdown(&mut self) {
        if let Some(range) = self.coordinator.cancel_pending() {
            EngineMetrics::bump(&self.metrics.fetches_cancelled, 1);
            info!(target: "runtime.shutdown", %range, "in_flight_fetch_cancelled");
        }
        self.timers.disarm_all();
        self.deferred_retries.clear();
    }

    fn scroll_to(&mut self, offset: usize, now: Instant) {
        let offset = offset.min(self.max_offset());
        if !self.started {
            self.scroll_offset = offset;
            return;
        }
        if offset == self.scroll_offset {
            return;
        }
        self.scroll_offset = offset;
        let direction = self.direction.observe(offset);
        trace!(
            target: "engine.scheduler",
            offset,
            direction = direction.as_str(),
            "scroll"
        );
        self.arm_scroll_timers(now);
    }

    fn navigate(&mut self, nav: Navigation, now: Instant) {
        let current = self.scroll_offset as i64;
        let page = self.viewport.extent.max(self.row_height) as i64;
        let target = match nav {
            Navigation::Rows(n) => current.saturating_add(n.saturating_mul(self.row_height as i64)),
            Navigation::Pages(n) => current.saturating_add(n.saturating_mul(page)),
            Navigation::Home => 0,
            Navigation::End => self.max_offset() as i64,
        };
        self.scroll_to(target.max(0) as usize, now);
    }

    fn resize(&mut self, viewport: Viewport, now: Instant) {
        if !self.started {
            self.pending_resize = Some(viewport);
            self.apply_resize(now);
            return;
        }
        self.pending_resize = Some(viewport);
        self.timers
            .arm(TimerKind::Resize, now + self.settings.resize_debounce);
    }

    fn apply_resize(&mut self, now: Instant) {
        let Some(viewport) = self.pending_resize.take() else {
            return;
        };
        let old_mode = self.mode;
        let old_count = RangeCalculator::visible_count(self.viewport.extent, self.row_height);
        let first_visible = RangeCalculator::first_visible(self.scroll_offset, self.row_height);

        self.viewport = viewport;
        self.mode = self.settings.rows.mode_for(viewport.width);
        self.row_height = self.settings.rows.height(self.mode);
        if self.mode != old_mode {
            // Keep the same top row when the row height changes.
            self.scroll_offset = first_visible.saturating_mul(self.row_height);
        }
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
        self.direction.reset(self.scroll_offset);

        let new_count = RangeCalculator::visible_count(viewport.extent, self.row_height);
        let recompute = self.mode != old_mode || new_count != old_count;
        debug!(
            target: "engine.scheduler",
            width = viewport.width,
            extent = viewport.extent,
            mode = self.mode.as_str(),
            row_height = self.row_height,
            recompute,
            "resize_applied"
        );
        if recompute && self.started {
            self.arm_scroll_timers(now);
        }
    }

    fn arm_scroll_timers(&mut self, now: Instant) {
        self.timers
            .arm(TimerKind::Repaint, now + self.settings.repaint_debounce);
        self.timers
            .arm(TimerKind::Settle, now + self.settings.settle_debounce);
    }

    fn fire(&mut self, kind: TimerKind, now: Instant) {
        // Timers may have been popped by the runtime; make sure the slot is clear.
        self.timers.disarm(kind);
        trace!(target: "engine.scheduler", timer = kind.as_str(), "timer_fired");
        match kind {
            TimerKind::Repaint => self.repaint(),
            TimerKind::Settle | TimerKind::Recheck => self.reconcile(now),
            TimerKind::Resize => self.apply_resize(now),
            TimerKind::Retry(range) => self.retry(range),
        }
    }

    /// Widen the rendered range when the desired range outgrew it. A moved
    /// offset inside the rendered rows still needs a paint on a terminal.
    fn repaint(&mut self) {
        let desired = self.window().desired;
        if desired.extends_beyond(&self.rendered) {
            self.rendered = desired;
            self.render();
        } else if self.painted_offset != Some(self.scroll_offset) {
            self.render();
        }
    }

    /// Request missing rows in priority order and repaint the buffer range.
    ///
    /// Only one group can be in flight. A group that issues or is blocked ends
    /// the pass; the recheck scheduled after each completion picks up the
    /// next group.
    fn reconcile(&mut self, now: Instant) {
        EngineMetrics::bump(&self.metrics.reconcile_passes, 1);
        let window = self.window();
        let missing = self.cache.find_missing(window.desired);
        let groups = priority_groups(&window, self.direction.direction(), &missing);
        debug!(
            target: "engine.reconcile",
            visible = %window.visible,
            desired = %window.desired,
            missing_runs = missing.len(),
            groups = groups.len(),
            direction = self.direction.direction().as_str(),
            "reconcile_pass"
        );
        if groups.is_empty() {
            self.rendered = window.desired;
            self.render();
            return;
        }
        for group in groups {
            let outcome = self.coordinator.request_ranges(&group.runs);
            self.rendered = window.desired;
            self.render();
            match outcome {
                RequestOutcome::NoOp => continue,
                RequestOutcome::Issued { ticket, range } => {
                    EngineMetrics::bump(&self.metrics.fetches_issued, 1);
                    debug!(
                        target: "engine.reconcile",
                        group = group.kind.as_str(),
                        %ticket,
                        %range,
                        "group_requested"
                    );
                }
                RequestOutcome::Blocked(BlockReason::Overlapping { pending }) => {
                    debug!(
                        target: "engine.reconcile",
                        group = group.kind.as_str(),
                        %pending,
                        "group_deferred"
                    );
                }
                RequestOutcome::Blocked(BlockReason::Preempted { cancelled }) => {
                    EngineMetrics::bump(&self.metrics.fetches_cancelled, 1);
                    self.timers
                        .arm(TimerKind::Recheck, now + self.settings.recheck_delay);
                    self.release_deferred_retries(now);
                    debug!(
                        target: "engine.reconcile",
                        group = group.kind.as_str(),
                        %cancelled,
                        "group_preempted_pending"
                    );
                }
            }
            break;
        }
    }

    /// Re-request a failed range once its backoff elapsed.
    ///
    /// Ranges that left the desired window or were filled by another fetch
    /// lose their record instead. While another fetch runs the retry waits
    /// for the slot to free up.
    fn retry(&mut self, range: RowRange) {
        let desired = self.window().desired;
        if !range.overlaps(&desired) {
            self.coordinator.clear_retry(range);
            debug!(target: "fetch.retry", %range, %desired, "retry_dropped_out_of_window");
            return;
        }
        let missing = self.cache.find_missing(range);
        if missing.is_empty() {
            self.coordinator.clear_retry(range);
            debug!(target: "fetch.retry", %range, "retry_skipped_rows_cached");
            return;
        }
        if !self.coordinator.is_idle() {
            if !self.deferred_retries.contains(&range) {
                self.deferred_retries.push(range);
            }
            debug!(target: "fetch.retry", %range, "retry_deferred_in_flight");
            return;
        }
        let attempts = self.coordinator.retry_attempts(range);
        match self.coordinator.request_ranges(&missing) {
            RequestOutcome::Issued {
                ticket,
                range: issued,
            } => {
                EngineMetrics::bump(&self.metrics.fetches_issued, 1);
                if issued != range {
                    // Narrower bounds start their own record.
                    self.coordinator.clear_retry(range);
                }
                debug!(
                    target: "fetch.retry",
                    %range,
                    %issued,
                    %ticket,
                    attempts,
                    "retry_issued"
                );
                self.render();
            }
            other => {
                trace!(target: "fetch.retry", %range, ?other, "retry_not_issued");
            }
        }
    }

    /// Put retries that waited on a busy slot back on a short timer. A range
    /// that just failed again keeps its fresh backoff deadline.
    fn release_deferred_retries(&mut self, now: Instant) {
        for range in std::mem::take(&mut self.deferred_retries) {
            let kind = TimerKind::Retry(range);
            if !self.timers.is_armed(kind) {
                self.timers.arm(kind, now + self.settings.recheck_delay);
            }
        }
    }

    fn complete(&mut self, resolution: FetchResolution<P>, now: Instant) {
        let plan = PrunePlan {
            center: self.rendered.midpoint(),
            keep_distance: self.settings.keep_distance(),
            target_size: self.settings.max_cache_size,
        };
        match self.coordinator.resolve(resolution, &mut self.cache, plan) {
            Completion::Discarded { .. } => return,
            Completion::Cancelled { range } => {
                debug!(target: "engine.scheduler", %range, "fetch_cancel_observed");
            }
            Completion::Merged {
                range,
                merged,
                evicted,
                ..
            } => {
                EngineMetrics::bump(&self.metrics.rows_merged, merged as u64);
                EngineMetrics::bump(&self.metrics.rows_evicted, evicted as u64);
                let superseded = self.timers.disarm_retries_within(range);
                self.deferred_retries.retain(|r| !range.covers(r));
                if superseded > 0 {
                    debug!(target: "fetch.retry", %range, superseded, "retry_timers_superseded");
                }
                self.coordinator.take_recheck();
                self.timers
                    .arm(TimerKind::Recheck, now + self.settings.recheck_delay);
                self.render();
            }
            Completion::Retry { range, delay, .. } => {
                EngineMetrics::bump(&self.metrics.fetches_failed, 1);
                self.timers.arm(TimerKind::Retry(range), now + delay);
                self.recheck_after_failure(range, now + delay);
                self.render();
            }
            Completion::Terminal {
                range, attempts, ..
            } => {
                EngineMetrics::bump(&self.metrics.terminal_failures, 1);
                warn!(
                    target: "engine.scheduler",
                    %range,
                    attempts,
                    "rows_left_as_placeholders"
                );
                self.recheck_after_failure(range, now + self.settings.retry_delay);
                self.render();
            }
        }
        self.release_deferred_retries(now);
    }

    /// Honor requests the failed fetch absorbed, no sooner than `at` so the
    /// failed rows are not re-requested ahead of their backoff.
    fn recheck_after_failure(&mut self, range: RowRange, at: Instant) {
        if self.coordinator.take_recheck() {
            debug!(target: "engine.scheduler", %range, "absorbed_recheck_after_failure");
            self.timers.arm(TimerKind::Recheck, at);
        }
    }

    fn render(&mut self) {
        let window = self.window();
        let frame = RenderFrame {
            rendered: self.rendered,
            visible: window.visible,
            scroll_offset: self.scroll_offset,
            row_height: self.row_height,
            extent: self.viewport.extent,
            width: self.viewport.width,
            cache: &self.cache,
            in_flight: self.coordinator.pending_range(),
        };
        self.renderer.paint(&frame);
        self.painted_offset = Some(self.scroll_offset);
        EngineMetrics::bump(&self.metrics.renders, 1);
    }

    fn max_offset(&self) -> usize {
        self.calculator
            .max_offset(self.viewport.extent, self.row_height)
    }

    pub fn window(&self) -> ViewWindow {
        self.calculator
            .window(self.scroll_offset, self.viewport.extent, self.row_height)
    }

    pub fn cache(&self) -> &RowCache<P> {
        &self.cache
    }

    pub fn rendered_range(&self) -> RowRange {
        self.rendered
    }

    pub fn pending_range(&self) -> Option<RowRange> {
        self.coordinator.pending_range()
    }

    pub fn retry_attempts(&self, range: RowRange) -> u32 {
        self.coordinator.retry_attempts(range)
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn direction(&self) -> ScrollDirection {
        self.direction.direction()
    }

    pub fn row_height(&self) -> usize {
        self.row_height
    }

    pub fn mode(&self) -> RowHeightMode {
        self.mode
    }

    pub fn total_rows(&self) -> usize {
        self.calculator.total_rows
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;
    use core_fetch::{CancellationToken, FetchRequest};
    use core_events::FetchTicket;
    use core_range::RowMetrics;
    use std::time::Duration;

    struct Sink;

    impl FetchDispatch<u32> for Sink {
        fn dispatch(&mut self, _: FetchTicket, _: FetchRequest, _: CancellationToken) {}
    }

    fn engine(total: usize) -> GuideEngine<u32> {
        let settings = GuideSettings {
            rows: RowMetrics {
                desktop_height: 10,
                mobile_height: 8,
                mobile_breakpoint: 600,
            },
            ..GuideSettings::default()
        };
        GuideEngine::new(
            settings,
            total,
            Viewport::new(1000, 200),
            Box::new(Sink),
            Box::new(NullRenderer),
        )
    }

    #[test]
    fn scroll_before_start_only_stores_offset() {
        let mut e = engine(1000);
        let t0 = Instant::now();
        e.handle(Event::Scroll { offset: 300 }, t0);
        assert_eq!(e.scroll_offset(), 300);
        assert_eq!(e.next_deadline(), None);
    }

    #[test]
    fn scroll_offset_is_clamped_to_universe() {
        let mut e = engine(100);
        let t0 = Instant::now();
        e.seed((0..100).map(|i| Row::new(i, i as u32)));
        e.start(None, t0);
        e.handle(Event::Scroll { offset: usize::MAX }, t0);
        assert_eq!(e.scroll_offset(), 100 * 10 - 200);
        assert!(e.rendered_range().end <= 100);
    }

    #[test]
    fn navigation_moves_by_rows_and_pages() {
        let mut e = engine(1000);
        let t0 = Instant::now();
        e.seed((0..30).map(|i| Row::new(i, i as u32)));
        e.start(None, t0);
        e.handle(Event::Navigate(Navigation::Rows(3)), t0);
        assert_eq!(e.scroll_offset(), 30);
        e.handle(Event::Navigate(Navigation::Pages(1)), t0);
        assert_eq!(e.scroll_offset(), 230);
        e.handle(Event::Navigate(Navigation::Rows(-100)), t0);
        assert_eq!(e.scroll_offset(), 0);
        e.handle(Event::Navigate(Navigation::End), t0);
        assert_eq!(e.scroll_offset(), 1000 * 10 - 200);
        e.handle(Event::Navigate(Navigation::Home), t0);
        assert_eq!(e.scroll_offset(), 0);
    }

    #[test]
    fn resize_across_breakpoint_switches_mode_and_keeps_top_row() {
        let mut e = engine(1000);
        let t0 = Instant::now();
        e.seed((0..30).map(|i| Row::new(i, i as u32)));
        e.start(Some(1000), t0);
        assert_eq!(e.window().first_visible, 100);
        e.handle(Event::Resize { width: 400, height: 200 }, t0);
        assert_eq!(e.mode(), RowHeightMode::Desktop, "debounced");
        let later = t0 + Duration::from_millis(200);
        e.advance(later);
        assert_eq!(e.mode(), RowHeightMode::Mobile);
        assert_eq!(e.row_height(), 8);
        assert_eq!(e.window().first_visible, 100);
        assert!(e.timers().is_armed(TimerKind::Settle));
    }

    #[test]
    fn shutdown_clears_timers() {
        let mut e = engine(1000);
        let t0 = Instant::now();
        e.seed((0..30).map(|i| Row::new(i, i as u32)));
        e.start(None, t0);
        assert!(e.next_deadline().is_some());
        assert_eq!(e.handle(Event::Shutdown, t0), Flow::Shutdown);
        assert_eq!(e.next_deadline(), None);
    }
}

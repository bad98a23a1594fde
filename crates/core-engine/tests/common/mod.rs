#![allow(dead_code)]

use core_cache::Row;
use core_config::GuideSettings;
use core_engine::{GuideEngine, RenderFrame, RowRenderer, Viewport};
use core_events::{Event, FetchError, FetchResolution, FetchTicket};
use core_fetch::{CancellationToken, FetchDispatch, FetchRequest};
use core_range::{RowMetrics, RowRange};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Dispatched {
    pub ticket: FetchTicket,
    pub request: FetchRequest,
    pub cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct RecordingDispatch(pub Arc<Mutex<Vec<Dispatched>>>);

impl FetchDispatch<String> for RecordingDispatch {
    fn dispatch(&mut self, ticket: FetchTicket, request: FetchRequest, cancel: CancellationToken) {
        self.0.lock().unwrap().push(Dispatched {
            ticket,
            request,
            cancel,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub rendered: RowRange,
    pub visible: RowRange,
    pub placeholders: usize,
    pub in_flight: Option<RowRange>,
}

#[derive(Clone, Default)]
pub struct RecordingRenderer(pub Arc<Mutex<Vec<Frame>>>);

impl RowRenderer<String> for RecordingRenderer {
    fn paint(&mut self, frame: &RenderFrame<'_, String>) {
        self.0.lock().unwrap().push(Frame {
            rendered: frame.rendered,
            visible: frame.visible,
            placeholders: frame.placeholders(),
            in_flight: frame.in_flight,
        });
    }
}

/// Row height 10 above a 600-wide breakpoint, 8 at or below it.
pub fn settings(buffer_size: usize) -> GuideSettings {
    GuideSettings {
        rows: RowMetrics {
            desktop_height: 10,
            mobile_height: 8,
            mobile_breakpoint: 600,
        },
        buffer_size,
        max_cache_size: 500,
        max_retries: 3,
        retry_delay: Duration::from_millis(1000),
        recheck_delay: Duration::from_millis(50),
        direction_threshold: 5,
        repaint_debounce: Duration::from_millis(16),
        settle_debounce: Duration::from_millis(150),
        resize_debounce: Duration::from_millis(150),
    }
}

pub fn rows(range: RowRange) -> Vec<Row<String>> {
    range.iter().map(|i| Row::new(i, format!("channel {i}"))).collect()
}

pub struct Harness {
    pub engine: GuideEngine<String>,
    pub dispatched: Arc<Mutex<Vec<Dispatched>>>,
    pub frames: Arc<Mutex<Vec<Frame>>>,
    pub t0: Instant,
}

impl Harness {
    pub fn new(settings: GuideSettings, total_rows: usize, extent: usize) -> Self {
        let dispatch = RecordingDispatch::default();
        let renderer = RecordingRenderer::default();
        let dispatched = dispatch.0.clone();
        let frames = renderer.0.clone();
        let engine = GuideEngine::new(
            settings,
            total_rows,
            Viewport::new(1000, extent),
            Box::new(dispatch),
            Box::new(renderer),
        );
        Self {
            engine,
            dispatched,
            frames,
            t0: Instant::now(),
        }
    }

    pub fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    pub fn requested(&self) -> Vec<RowRange> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.request.range())
            .collect()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }

    pub fn last(&self) -> Dispatched {
        self.dispatched
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("at least one dispatch")
    }

    pub fn last_frame(&self) -> Frame {
        self.frames
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("at least one frame")
    }

    pub fn scroll(&mut self, offset: usize, ms: u64) {
        let now = self.at(ms);
        self.engine.handle(Event::Scroll { offset }, now);
    }

    pub fn advance(&mut self, ms: u64) {
        let now = self.at(ms);
        self.engine.advance(now);
    }

    /// Answer the most recent dispatch with exactly the rows it asked for.
    pub fn succeed_last(&mut self, ms: u64) {
        let last = self.last();
        let now = self.at(ms);
        self.engine.handle(
            Event::Fetch(FetchResolution::rows(last.ticket, rows(last.request.range()))),
            now,
        );
    }

    pub fn fail_last(&mut self, ms: u64) {
        let last = self.last();
        let now = self.at(ms);
        self.engine.handle(
            Event::Fetch(FetchResolution::failed(last.ticket, FetchError::Status(503))),
            now,
        );
    }
}

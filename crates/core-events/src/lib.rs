//! Core event types and channel helpers for the guide engine.
//!
//! Every input to the engine (scroll, resize, fetch completion, timer expiry)
//! is a typed [`Event`] consumed one at a time by the single control loop.
//! Feeding a deterministic sequence of events is how the engine is tested.

use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod fetch;

pub use fetch::{FetchError, FetchOutcome, FetchResolution, FetchTicket};

use core_range::RowRange;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// The runtime consumes a bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers (terminal
// input, tick source, fetch tasks) await `send`, which parks them until space is available rather
// than dropping events. Fetch completions must never be dropped: a lost completion would leave the
// single in-flight slot occupied forever.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static FETCH_COMPLETIONS_SENT: AtomicU64 = AtomicU64::new(0);
pub static SCROLL_EVENTS_SENT: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the engine control loop.
#[derive(Debug, Clone)]
pub enum Event<P> {
    /// Absolute scroll offset reported by the view.
    Scroll { offset: usize },
    /// Relative movement requested by keyboard navigation.
    Navigate(Navigation),
    /// Viewport dimensions changed (width, height in offset units).
    Resize { width: usize, height: usize },
    /// A retrieval resolved, failed, or observed its cancellation.
    Fetch(FetchResolution<P>),
    /// A scheduled timer expired.
    Timer(TimerKind),
    /// Periodic monotonic tick; repaints time-dependent decorations.
    Tick,
    Shutdown,
}

impl<P> Event<P> {
    /// Stable discriminant label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Scroll { .. } => "scroll",
            Event::Navigate(_) => "navigate",
            Event::Resize { .. } => "resize",
            Event::Fetch(_) => "fetch",
            Event::Timer(_) => "timer",
            Event::Tick => "tick",
            Event::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Move by whole rows (negative = toward row 0).
    Rows(i64),
    /// Move by viewport extents.
    Pages(i64),
    Home,
    End,
}

/// Engine timers. Each kind owns one deadline slot, except `Retry` which is
/// keyed by the failed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Frame-scale repaint using whatever is cached.
    Repaint,
    /// Scroll-pause debounce; runs the reconciliation pass.
    Settle,
    /// Resize debounce; recomputes row height mode.
    Resize,
    /// Short re-evaluation after a completion or preemption.
    Recheck,
    /// Backoff retry of a failed range.
    Retry(RowRange),
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Repaint => "repaint",
            TimerKind::Settle => "settle",
            TimerKind::Resize => "resize",
            TimerKind::Recheck => "recheck",
            TimerKind::Retry(_) => "retry",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Every background producer (terminal input, periodic tick) registers uniformly. Each source owns
// its task lifecycle and must terminate promptly once the channel is closed.

/// Trait implemented by any async event producer.
pub trait AsyncEventSource<P>: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors stop when
    /// `tx.send(..).await` returns Err or on their own stop condition.
    fn spawn(self: Box<Self>, tx: Sender<Event<P>>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry<P> {
    sources: Vec<Box<dyn AsyncEventSource<P>>>,
}

impl<P: Send + 'static> Default for EventSourceRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send + 'static> EventSourceRegistry<P> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource<P>>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source
    /// receives its own `Sender` clone; the registry is drained so a second
    /// call spawns nothing.
    pub fn spawn_all(&mut self, tx: &Sender<Event<P>>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Built-in monotonic tick source. Emits `Event::Tick` every interval.
pub struct TickEventSource {
    interval: Duration,
}

impl TickEventSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl<P: Send + 'static> AsyncEventSource<P> for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event<P>>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            // First tick completes immediately; skip it so the initial render is not duplicated.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    struct MockOnceSource;

    impl AsyncEventSource<()> for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event<()>>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(Event::Scroll { offset: 42 }).await;
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event<()>>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource);
        reg.register(TickEventSource::new(Duration::from_millis(10)));
        assert_eq!(reg.len(), 2);
        let handles = reg.spawn_all(&tx);
        assert!(reg.is_empty(), "spawn_all drains the registry");

        let mut got_scroll = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) && (!got_scroll || !got_tick) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(5), rx.recv()).await {
                match ev {
                    Event::Scroll { offset: 42 } => got_scroll = true,
                    Event::Tick => got_tick = true,
                    _ => {}
                }
            }
        }
        assert!(got_scroll, "expected mock source to produce a scroll event");
        assert!(got_tick, "expected tick source to emit tick events");

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(20), handle).await;
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource<()> for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event<()>>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event<()>>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn event_kind_labels() {
        let ev: Event<()> = Event::Timer(TimerKind::Retry(RowRange::new(0, 50)));
        assert_eq!(ev.kind(), "timer");
        assert_eq!(TimerKind::Retry(RowRange::new(0, 50)).as_str(), "retry");
        assert_eq!(Event::<()>::Navigate(Navigation::Home).kind(), "navigate");
    }
}

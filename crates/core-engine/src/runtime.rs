//! Async control loop around a [`GuideEngine`].
//!
//! One task owns the engine. It waits on the event channel and on the
//! engine's next timer deadline, whichever comes first, and processes events
//! strictly one at a time.

use crate::engine::{Flow, GuideEngine};
use crate::metrics::EngineMetricsSnapshot;
use crate::store::ScrollPositionStore;
use anyhow::Result;
use core_events::Event;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: ShutdownReason,
    pub events: u64,
    pub final_offset: usize,
    pub metrics: EngineMetricsSnapshot,
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage,
        "shutdown_stage"
    );
}

/// Current time on the tokio clock, so paused-time tests drive the engine.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

pub struct EngineRuntime<P> {
    engine: GuideEngine<P>,
    rx: Receiver<Event<P>>,
    store: Box<dyn ScrollPositionStore>,
    source_handles: Vec<JoinHandle<()>>,
}

impl<P: Send + 'static> EngineRuntime<P> {
    pub fn new(
        engine: GuideEngine<P>,
        rx: Receiver<Event<P>>,
        store: Box<dyn ScrollPositionStore>,
    ) -> Self {
        Self {
            engine,
            rx,
            store,
            source_handles: Vec::new(),
        }
    }

    /// Event source tasks joined (with a timeout) during shutdown.
    pub fn with_sources(mut self, handles: Vec<JoinHandle<()>>) -> Self {
        self.source_handles = handles;
        self
    }

    pub async fn run(mut self) -> Result<RunSummary> {
        let restored = match self.store.load() {
            Ok(offset) => offset,
            Err(err) => {
                warn!(target: "runtime", error = %err, "scroll_position_load_failed");
                None
            }
        };
        self.engine.start(restored, now());
        info!(
            target: "runtime",
            restored = ?restored,
            total_rows = self.engine.total_rows(),
            "event_loop_start"
        );

        let mut events = 0u64;
        let reason = loop {
            let deadline = self.engine.next_deadline();
            tokio::select! {
                maybe = self.rx.recv() => {
                    let Some(event) = maybe else {
                        break ShutdownReason::ChannelClosed;
                    };
                    events += 1;
                    if self.engine.handle(event, now()) == Flow::Shutdown {
                        break ShutdownReason::ShutdownEvent;
                    }
                }
                _ = wait_until(deadline) => {
                    self.engine.advance(now());
                }
            }
        };

        self.finalize_shutdown(reason).await;
        Ok(RunSummary {
            reason,
            events,
            final_offset: self.engine.scroll_offset(),
            metrics: self.engine.metrics(),
        })
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        self.engine.shutdown();
        self.rx.close();

        let offset = self.engine.scroll_offset();
        match self.store.save(offset) {
            Ok(()) => trace!(target: "runtime.shutdown", offset, "scroll_position_saved"),
            Err(err) => warn!(
                target: "runtime.shutdown",
                offset,
                error = %err,
                "scroll_position_save_failed"
            ),
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(())) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }
        log_shutdown_stage(reason, "complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_reason_labels_are_stable() {
        assert_eq!(ShutdownReason::ShutdownEvent.as_str(), "shutdown_event");
        assert_eq!(ShutdownReason::ChannelClosed.to_string(), "channel_closed");
    }
}

//! Terminal input as an engine event source.
//!
//! Keys become navigation or shutdown events; terminal resizes become
//! `Event::Resize` for the guide area. The task ends on its shutdown signal,
//! when the stream ends or errors, or when the engine channel closes.

use crate::terminal::guide_area_from;
use core_events::{CHANNEL_SEND_FAILURES, Event, Navigation, SCROLL_EVENTS_SENT};
use crossterm::event::{
    Event as CEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, trace, warn};

#[derive(Clone, Debug)]
pub struct InputShutdown {
    notify: Arc<Notify>,
}

impl InputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    ShutdownSignal,
    ChannelClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

/// Map a key press to an engine event. Releases are ignored.
pub fn map_key<P>(key: &KeyEvent) -> Option<Event<P>> {
    if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Event::Shutdown),
            KeyCode::Char('d') => Some(Event::Navigate(Navigation::Pages(1))),
            KeyCode::Char('u') => Some(Event::Navigate(Navigation::Pages(-1))),
            _ => None,
        };
    }
    let nav = match key.code {
        KeyCode::Char('j') | KeyCode::Down => Navigation::Rows(1),
        KeyCode::Char('k') | KeyCode::Up => Navigation::Rows(-1),
        KeyCode::PageDown | KeyCode::Char(' ') => Navigation::Pages(1),
        KeyCode::PageUp | KeyCode::Char('b') => Navigation::Pages(-1),
        KeyCode::Home | KeyCode::Char('g') => Navigation::Home,
        KeyCode::End | KeyCode::Char('G') => Navigation::End,
        KeyCode::Char('q') | KeyCode::Esc => return Some(Event::Shutdown),
        _ => return None,
    };
    Some(Event::Navigate(nav))
}

pub struct TerminalInput<S, P> {
    stream: S,
    sender: Sender<Event<P>>,
    notify: Arc<Notify>,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Send + 'static> TerminalInput<EventStream, P> {
    /// Spawn the crossterm reader task.
    pub fn spawn(sender: Sender<Event<P>>) -> (JoinHandle<()>, InputShutdown) {
        Self::spawn_with(EventStream::new(), sender)
    }
}

impl<S, P> TerminalInput<S, P>
where
    S: Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
    P: Send + 'static,
{
    pub fn spawn_with(stream: S, sender: Sender<Event<P>>) -> (JoinHandle<()>, InputShutdown) {
        let notify = Arc::new(Notify::new());
        let shutdown = InputShutdown {
            notify: notify.clone(),
        };
        let task = Self {
            stream,
            sender,
            notify,
            _payload: PhantomData,
        };
        (tokio::spawn(task.run()), shutdown)
    }

    async fn run(mut self) {
        info!(target: "input.event", "input_task_started");
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = self.notify.notified() => break ExitReason::ShutdownSignal,
                next = self.stream.next() => next,
            };
            let event = match next {
                None => break ExitReason::StreamEnded,
                Some(Err(err)) => {
                    warn!(target: "input.event", error_kind = ?err.kind(), "input_stream_error");
                    break ExitReason::StreamError;
                }
                Some(Ok(CEvent::Key(key))) => map_key(&key),
                Some(Ok(CEvent::Resize(w, h))) => {
                    trace!(target: "input.event", w, h, "resize");
                    let (width, height) = guide_area_from(w, h);
                    Some(Event::Resize { width, height })
                }
                Some(Ok(_)) => None,
            };
            let Some(event) = event else { continue };
            trace!(target: "input.event", kind = event.kind(), "input_forwarded");
            let is_nav = matches!(event, Event::Navigate(_));
            if self.sender.send(event).await.is_err() {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                break ExitReason::ChannelClosed;
            }
            if is_nav {
                SCROLL_EVENTS_SENT.fetch_add(1, Ordering::Relaxed);
            }
        };
        info!(target: "input.event", reason = reason.as_str(), "input_task_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::{Duration, timeout};

    fn press(code: KeyCode) -> CEvent {
        CEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    async fn run_scenario(events: Vec<CEvent>) -> Vec<Event<()>> {
        let (tx, mut rx) = mpsc::channel(16);
        let stream = tokio_stream::iter(events.into_iter().map(Ok::<_, io::Error>));
        let (handle, _shutdown) = TerminalInput::spawn_with(stream, tx);
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("input task finishes when the stream ends")
            .expect("input task does not panic");
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn navigation_keys_map_to_events() {
        let out = run_scenario(vec![
            press(KeyCode::Char('j')),
            press(KeyCode::Up),
            press(KeyCode::PageDown),
            press(KeyCode::Char('G')),
            press(KeyCode::Char('x')),
        ])
        .await;
        assert!(matches!(
            out.as_slice(),
            [
                Event::Navigate(Navigation::Rows(1)),
                Event::Navigate(Navigation::Rows(-1)),
                Event::Navigate(Navigation::Pages(1)),
                Event::Navigate(Navigation::End),
            ]
        ));
    }

    #[tokio::test]
    async fn quit_keys_request_shutdown() {
        let out = run_scenario(vec![
            press(KeyCode::Char('q')),
            CEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        ])
        .await;
        assert!(matches!(out.as_slice(), [Event::Shutdown, Event::Shutdown]));
    }

    #[tokio::test]
    async fn resize_excludes_status_line() {
        let out = run_scenario(vec![CEvent::Resize(120, 40)]).await;
        assert!(matches!(
            out.as_slice(),
            [Event::Resize {
                width: 120,
                height: 39
            }]
        ));
    }

    #[tokio::test]
    async fn shutdown_signal_stops_pending_stream() {
        let (tx, _rx) = mpsc::channel::<Event<()>>(4);
        let stream = tokio_stream::pending::<io::Result<CEvent>>();
        let (handle, shutdown) = TerminalInput::spawn_with(stream, tx);
        shutdown.signal();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("signal stops the task")
            .expect("input task does not panic");
    }
}

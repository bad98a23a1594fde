//! epgview entrypoint: a terminal program guide driven by the windowed
//! guide engine over a synthetic provider.

mod input;
mod provider;
mod render;
mod store;
mod terminal;

use anyhow::Result;
use clap::Parser;
use core_config::{GuideSettings, load_from};
use core_engine::{EngineRuntime, GuideEngine, RunSummary, Viewport};
use core_events::{EVENT_CHANNEL_CAP, Event, EventSourceRegistry, TickEventSource};
use core_fetch::TokioFetchDispatch;
use core_range::{RangeCalculator, RowRange};
use input::TerminalInput;
use provider::{ChannelRow, SyntheticGuide, WINDOW_START_FILTER};
use render::TerminalRenderer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use store::JsonScrollStore;
use terminal::TerminalSession;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "epgview.log";
const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "epgview", version, about = "Terminal program guide")]
struct Args {
    /// Configuration file path (overrides discovery of `epgview.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Number of channels in the guide.
    #[arg(long, default_value_t = 5_000)]
    rows: usize,
    /// Simulated provider latency in milliseconds.
    #[arg(long = "latency-ms", default_value_t = 250)]
    latency_ms: u64,
    /// Fail every Nth provider call (0 disables).
    #[arg(long = "fail-every", default_value_t = 0)]
    fail_every: u64,
    /// Program grid start, minutes after midnight.
    #[arg(long = "window-start", default_value_t = 0)]
    window_start: u32,
    /// Scroll position file (defaults to the platform data dir).
    #[arg(long = "position-file")]
    position_file: Option<PathBuf>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(()) => self.log_guard = Some(guard),
            Err(_) => {
                // Subscriber already installed; dropping the guard stops the writer.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Rows delivered with the first page: the first screen at the default offset.
fn initial_range(settings: &GuideSettings, viewport: Viewport) -> RowRange {
    let height = settings.rows.height(settings.rows.mode_for(viewport.width));
    RowRange::with_len(0, RangeCalculator::visible_count(viewport.extent, height))
}

async fn run(args: Args) -> Result<RunSummary> {
    let config = load_from(args.config.clone())?;
    let settings = config.settings();
    info!(
        target: "runtime",
        rows = args.rows,
        buffer = settings.buffer_size,
        max_cache = settings.max_cache_size,
        config_file = config.raw.is_some(),
        "startup"
    );

    let _terminal = TerminalSession::enter("epgview")?;
    let (width, extent) = TerminalSession::guide_area()?;
    let viewport = Viewport::new(width, extent);

    let guide = Arc::new(
        SyntheticGuide::new(args.rows)
            .with_latency(Duration::from_millis(args.latency_ms))
            .with_failures(Some(args.fail_every)),
    );
    let (tx, rx) = mpsc::channel::<Event<ChannelRow>>(EVENT_CHANNEL_CAP);

    let mut engine = GuideEngine::new(
        settings,
        args.rows,
        viewport,
        Box::new(TokioFetchDispatch::new(guide.clone(), tx.clone())),
        Box::new(TerminalRenderer::new(std::io::stdout())),
    )
    .with_filters(vec![(
        WINDOW_START_FILTER.to_string(),
        args.window_start.to_string(),
    )]);
    engine.seed(guide.initial_rows(initial_range(&settings, viewport)));

    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(TICK_INTERVAL));
    let source_handles = registry.spawn_all(&tx);
    let (input_task, input_shutdown) = TerminalInput::spawn(tx.clone());
    drop(tx);

    let store = args
        .position_file
        .map(JsonScrollStore::new)
        .unwrap_or_else(|| JsonScrollStore::new(JsonScrollStore::default_path()));
    trace!(target: "runtime", path = %store.path().display(), "scroll_store");

    let summary = EngineRuntime::new(engine, rx, Box::new(store))
        .with_sources(source_handles)
        .run()
        .await?;

    input_shutdown.signal();
    match tokio::time::timeout(Duration::from_millis(200), input_task).await {
        Ok(Ok(())) => trace!(target: "runtime.shutdown", "input_task_joined"),
        Ok(Err(err)) => warn!(target: "runtime.shutdown", ?err, "input_task_join_failed"),
        Err(_) => warn!(target: "runtime.shutdown", "input_task_timeout"),
    }
    info!(
        target: "runtime",
        reason = summary.reason.as_str(),
        events = summary.events,
        provider_calls = guide.calls(),
        metrics = ?summary.metrics,
        "shutdown_complete"
    );
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    let args = Args::parse();
    run(args).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_defaults() {
        let args = Args::parse_from(["epgview"]);
        assert_eq!(args.rows, 5_000);
        assert_eq!(args.latency_ms, 250);
        assert_eq!(args.fail_every, 0);
        assert!(args.config.is_none());
    }

    #[test]
    fn initial_range_covers_first_screen() {
        let settings = GuideSettings::default();
        // Desktop rows are 3 lines; 30 lines show 11 rows (10 whole plus a partial).
        let range = initial_range(&settings, Viewport::new(120, 30));
        assert_eq!(range, RowRange::new(0, 11));
    }

    #[tokio::test]
    async fn bounded_channel_capacity_blocking() {
        let (tx, mut rx) = mpsc::channel::<Event<ChannelRow>>(1);
        tx.send(Event::Tick).await.unwrap();
        let tx2 = tx.clone();
        let waiter = tokio::spawn(async move { tx2.send(Event::Tick).await.is_ok() });
        rx.recv().await.unwrap();
        assert!(waiter.await.unwrap());
        assert!(rx.recv().await.is_some());
    }
}

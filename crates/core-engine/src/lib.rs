//! Windowed guide virtualization engine.
//!
//! `GuideEngine` maps scroll state to the rows that must be materialized,
//! keeps a bounded cache of fetched rows, and drives at most one retrieval at
//! a time through `core-fetch`. `EngineRuntime` hosts it on a tokio task.

pub mod engine;
pub mod metrics;
pub mod reconcile;
pub mod render;
pub mod runtime;
pub mod store;
pub mod timers;

pub use engine::{Flow, GuideEngine, Viewport};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use reconcile::{GroupKind, PriorityGroup, priority_groups};
pub use render::{NullRenderer, RenderFrame, RowRenderer};
pub use runtime::{EngineRuntime, RunSummary, ShutdownReason};
pub use store::{MemoryScrollStore, ScrollPositionStore};
pub use timers::TimerSet;

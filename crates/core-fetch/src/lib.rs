//! Fetch coordination: single-flight retrieval, retries, cancellation.
//!
//! The [`FetchCoordinator`] owns the one pending-fetch slot. It never awaits
//! anything itself: retrievals are handed to a [`FetchDispatch`] which later
//! delivers a `FetchResolution` back through the event loop, where the
//! coordinator either merges the rows, schedules a retry, or discards a stale
//! result.

pub mod coordinator;
pub mod dispatch;
pub mod provider;
pub mod retry;

pub use coordinator::{
    BlockReason, Completion, CoordinatorMetricsSnapshot, FetchCoordinator, FetchDispatch,
    FetchState, PrunePlan, RequestOutcome,
};
pub use dispatch::TokioFetchDispatch;
pub use provider::{FetchRequest, RowProvider};
pub use retry::{RetryDecision, RetryTracker};

/// Cancellation handle handed to every retrieval. Cancelling is advisory: the
/// coordinator ignores the eventual result, and providers may watch the token
/// to abort their transport early.
pub use tokio_util::sync::CancellationToken;

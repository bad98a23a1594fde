//! Data provider contract.

use crate::CancellationToken;
use core_cache::Row;
use core_events::FetchError;
use core_range::RowRange;
use std::future::Future;

/// Request for `count` rows starting at `start`, plus caller-defined scope
/// filters (category ids, time window) forwarded verbatim to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub start: usize,
    pub count: usize,
    pub filters: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(range: RowRange, filters: Vec<(String, String)>) -> Self {
        Self {
            start: range.start,
            count: range.len(),
            filters,
        }
    }

    pub fn range(&self) -> RowRange {
        RowRange::with_len(self.start, self.count)
    }
}

/// External source of rows for an index range.
///
/// Any error is treated as a retryable failure. Implementations may watch
/// `cancel` to abort early; the dispatcher reports cancellation on its own
/// regardless of what the provider returns afterwards.
pub trait RowProvider<P>: Send + Sync + 'static {
    fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<Row<P>>, FetchError>> + Send;
}

//! Fetch resolution payloads carried back into the control loop.

use core_cache::Row;
use std::fmt;
use thiserror::Error;

/// Identity of one issued retrieval. Monotonic per coordinator; a resolution
/// whose ticket no longer matches the pending slot is stale and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(pub u64);

impl fmt::Display for FetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Retryable retrieval failure. Cancellation is deliberately not a variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub enum FetchOutcome<P> {
    Rows(Vec<Row<P>>),
    Failed(FetchError),
    Cancelled,
}

impl<P> FetchOutcome<P> {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchOutcome::Rows(_) => "rows",
            FetchOutcome::Failed(_) => "failed",
            FetchOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResolution<P> {
    pub ticket: FetchTicket,
    pub outcome: FetchOutcome<P>,
}

impl<P> FetchResolution<P> {
    pub fn rows(ticket: FetchTicket, rows: Vec<Row<P>>) -> Self {
        Self {
            ticket,
            outcome: FetchOutcome::Rows(rows),
        }
    }

    pub fn failed(ticket: FetchTicket, err: FetchError) -> Self {
        Self {
            ticket,
            outcome: FetchOutcome::Failed(err),
        }
    }

    pub fn cancelled(ticket: FetchTicket) -> Self {
        Self {
            ticket,
            outcome: FetchOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display() {
        assert_eq!(
            FetchError::Status(503).to_string(),
            "provider returned status 503"
        );
        assert!(
            FetchError::Malformed("row index missing".into())
                .to_string()
                .contains("row index missing")
        );
    }

    #[test]
    fn resolution_constructors_label_outcome() {
        let r: FetchResolution<u8> = FetchResolution::cancelled(FetchTicket(3));
        assert_eq!(r.outcome.as_str(), "cancelled");
        assert_eq!(r.ticket.to_string(), "#3");
        let ok = FetchResolution::rows(FetchTicket(4), vec![Row::new(1, 9u8)]);
        assert_eq!(ok.outcome.as_str(), "rows");
    }
}

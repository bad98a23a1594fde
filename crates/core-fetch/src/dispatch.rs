//! Tokio-backed dispatcher: one task per retrieval, resolution sent back on
//! the engine event channel.

use crate::{CancellationToken, FetchDispatch, FetchRequest, RowProvider};
use core_events::{
    CHANNEL_SEND_FAILURES, Event, FETCH_COMPLETIONS_SENT, FetchOutcome, FetchResolution,
    FetchTicket,
};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::Sender;
use tracing::{trace, warn};

pub struct TokioFetchDispatch<S, P> {
    provider: Arc<S>,
    tx: Sender<Event<P>>,
    _payload: PhantomData<fn() -> P>,
}

impl<S, P> TokioFetchDispatch<S, P> {
    pub fn new(provider: Arc<S>, tx: Sender<Event<P>>) -> Self {
        Self {
            provider,
            tx,
            _payload: PhantomData,
        }
    }
}

impl<S, P> FetchDispatch<P> for TokioFetchDispatch<S, P>
where
    S: RowProvider<P>,
    P: Send + 'static,
{
    fn dispatch(&mut self, ticket: FetchTicket, request: FetchRequest, cancel: CancellationToken) {
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let range = request.range();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => FetchOutcome::Cancelled,
                result = provider.fetch(request, cancel.clone()) => match result {
                    _ if cancel.is_cancelled() => FetchOutcome::Cancelled,
                    Ok(rows) => FetchOutcome::Rows(rows),
                    Err(err) => FetchOutcome::Failed(err),
                },
            };
            trace!(
                target: "fetch.coordinator",
                %ticket,
                %range,
                outcome = outcome.as_str(),
                "fetch_task_finished"
            );
            if tx
                .send(Event::Fetch(FetchResolution { ticket, outcome }))
                .await
                .is_err()
            {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                warn!(target: "fetch.coordinator", %ticket, "resolution_channel_closed");
            } else {
                FETCH_COMPLETIONS_SENT.fetch_add(1, Ordering::Relaxed);
            }
        });
    }
}

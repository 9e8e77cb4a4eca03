//! Pending-request table and the in-flight call handle.
//!
//! Every entry is removed exactly once: by a matching response, a timeout,
//! an explicit cancel, `destroy()`, or the call handle being dropped.
//! `DashMap::remove` is the single arbiter, so whichever path removes the
//! entry decides the outcome and every other path becomes a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_timer::Delay;
use futures_util::future::{select, Either};
use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::protocol::{Operation, ResponseBody};
use crate::shared::RequestId;

pub(crate) type Outcome = Result<ResponseBody, BridgeError>;

struct PendingEntry {
    operation: Operation,
    tx: oneshot::Sender<Outcome>,
}

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: DashMap<RequestId, PendingEntry>,
}

impl PendingTable {
    /// Insert an entry under an id not currently in the table.
    pub(crate) fn register(&self, operation: Operation) -> (RequestId, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        loop {
            let id = RequestId::generate();
            match self.entries.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(PendingEntry { operation, tx });
                    return (id, rx);
                }
            }
        }
    }

    /// Remove the entry for `id` and complete its call with `outcome`.
    ///
    /// Returns `false` if there was no such entry.
    pub(crate) fn settle(&self, id: &RequestId, outcome: impl FnOnce(Operation) -> Outcome) -> bool {
        match self.entries.remove(id) {
            Some((_, entry)) => {
                // The receiver may already be gone (caller dropped the call).
                let _ = entry.tx.send(outcome(entry.operation));
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id` without completing it.
    pub(crate) fn remove(&self, id: &RequestId) -> Option<Operation> {
        self.entries.remove(id).map(|(_, entry)| entry.operation)
    }

    /// Settle every entry with the error built by `error`. Returns how many were rejected.
    pub(crate) fn reject_all(&self, error: impl Fn(&RequestId) -> BridgeError) -> usize {
        let ids: Vec<RequestId> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.settle(id, |_| Err(error(id))))
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Map a correlated response body onto the call's outcome.
pub(crate) fn outcome(operation: Operation, body: ResponseBody) -> Outcome {
    match body {
        ResponseBody::Error { message, code } => Err(BridgeError::Remote { code, message }),
        body if body.operation() == Some(operation) => Ok(body),
        body => Err(BridgeError::UnexpectedResponse {
            expected: operation,
            received: body.tag(),
        }),
    }
}

// ─── PendingCall ─────────────────────────────────────────────────────────────

/// A request that has been posted and is waiting for its response.
///
/// The timeout runs from construction, i.e. from when the request is sent,
/// whether or not [`PendingCall::response`] is being awaited yet.
///
/// Dropping it abandons the request: its table entry is removed and a late
/// response is ignored.
pub struct PendingCall {
    id: RequestId,
    operation: Operation,
    rx: oneshot::Receiver<Outcome>,
    table: Arc<PendingTable>,
    timeout: Duration,
    deadline: Delay,
    started_at: DateTime<Utc>,
}

impl PendingCall {
    pub(crate) fn new(
        id: RequestId,
        operation: Operation,
        rx: oneshot::Receiver<Outcome>,
        table: Arc<PendingTable>,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            operation,
            rx,
            table,
            timeout,
            deadline: Delay::new(timeout),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Wait for the response, an `ERROR`, cancellation, or the timeout.
    pub async fn response(mut self) -> Result<ResponseBody, BridgeError> {
        let received = match select(&mut self.rx, &mut self.deadline).await {
            Either::Left((received, _)) => received,
            Either::Right(((), rx)) => {
                if self.table.remove(&self.id).is_some() {
                    let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
                    tracing::warn!(
                        "{} request {} timed out after {}ms",
                        self.operation,
                        self.id,
                        elapsed_ms
                    );
                    return Err(BridgeError::Timeout {
                        operation: self.operation,
                        elapsed_ms,
                    });
                }
                // Settled between the timer firing and the removal above.
                rx.await
            }
        };

        // A dropped sender means the table itself went away.
        received.unwrap_or(Err(BridgeError::Destroyed))
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.table.remove(&self.id).is_some() {
            tracing::debug!("Abandoned {} request {}", self.operation, self.id);
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("timeout", &self.timeout)
            .finish()
    }
}

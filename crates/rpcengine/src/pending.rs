//! Outstanding outbound calls.
//!
//! Every entry is completed at most once: whoever removes it from the table
//! (a matching response, a timeout, the caller giving up, or shutdown) owns
//! its completion.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rpcengine_common::{Id, RpcError};
use serde_json::Value;
use tokio::sync::oneshot;

pub(crate) type Outcome = Result<Value, RpcError>;

pub(crate) struct PendingCall {
    method: String,
    started: Instant,
    tx: oneshot::Sender<Outcome>,
}

impl PendingCall {
    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn complete(self, outcome: Outcome) {
        // the caller's future may have been dropped already
        let _ = self.tx.send(outcome);
    }
}

#[derive(Default)]
struct State {
    calls: HashMap<Id, PendingCall>,
    closed: Option<RpcError>,
}

#[derive(Default)]
pub(crate) struct PendingCalls {
    state: Mutex<State>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an entry, or refuses with the close reason once closed.
    pub(crate) fn register(&self, id: Id, method: &str) -> Result<oneshot::Receiver<Outcome>, RpcError> {
        let mut state = self.lock();
        if let Some(reason) = &state.closed {
            return Err(reason.clone());
        }
        if state.calls.contains_key(&id) {
            return Err(RpcError::internal_error(format!("call id {} already in use", id)));
        }
        let (tx, rx) = oneshot::channel();
        state.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                started: Instant::now(),
                tx,
            },
        );
        Ok(rx)
    }

    /// Removes an entry. Only the first taker gets it.
    pub(crate) fn take(&self, id: &Id) -> Option<PendingCall> {
        self.lock().calls.remove(id)
    }

    /// Marks the table closed and fails every entry with `reason`.
    ///
    /// Returns `None` if the table was already closed, otherwise the number
    /// of calls rejected.
    pub(crate) fn close(&self, reason: RpcError) -> Option<usize> {
        let drained: Vec<PendingCall> = {
            let mut state = self.lock();
            if state.closed.is_some() {
                return None;
            }
            state.closed = Some(reason.clone());
            state.calls.drain().map(|(_, call)| call).collect()
        };

        let count = drained.len();
        for call in drained {
            call.complete(Err(reason.clone()));
        }
        Some(count)
    }

    pub(crate) fn closed_reason(&self) -> Option<RpcError> {
        self.lock().closed.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().calls.len()
    }
}

//! Single-flight coordination for access token refreshes.
//!
//! Every clone of an `ApiClient` shares one `RefreshCoordinator`. The
//! refresh-in-progress gate, the queue of requests waiting on it and the
//! default authorization token live behind a single lock so they always
//! change together.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use super::ApiError;

/// Result of a settled refresh: the new access token or the refresh error
pub type RefreshOutcome = Result<String, ApiError>;

#[derive(Default)]
struct AuthState {
    refreshing: bool,
    queue: VecDeque<oneshot::Sender<RefreshOutcome>>,
    default_token: Option<String>,
}

/// What a request that hit a 401 has to do next
pub enum Ticket {
    /// No refresh was running; the holder must perform it and then call
    /// [`RefreshCoordinator::settle`]
    Leader,
    /// A refresh is already running; await the receiver for its outcome
    Queued(oneshot::Receiver<RefreshOutcome>),
}

impl Ticket {
    /// Wait for the outcome of the refresh this ticket was queued behind
    pub async fn outcome(self) -> Option<RefreshOutcome> {
        match self {
            Ticket::Leader => None,
            Ticket::Queued(rx) => Some(rx.await.unwrap_or(Err(ApiError::RefreshAbandoned))),
        }
    }
}

#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<AuthState>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the refresh gate, or join the queue if it is already held
    pub async fn enter(&self) -> Ticket {
        let mut state = self.state.lock().await;
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            debug!(queued = state.queue.len(), "Refresh in flight, request queued");
            Ticket::Queued(rx)
        } else {
            state.refreshing = true;
            debug!("Refresh gate acquired");
            Ticket::Leader
        }
    }

    /// Settle the running refresh.
    ///
    /// On success the new token becomes the default authorization. The gate
    /// is released and the queue emptied in the same critical section, then
    /// every queued request receives the outcome in arrival order. Returns
    /// how many requests were released.
    pub async fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock().await;
            if let Ok(token) = outcome {
                state.default_token = Some(token.clone());
            }
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };

        let released = waiters.len();
        for waiter in waiters {
            // Receiver gone means that caller was dropped; nothing to deliver
            let _ = waiter.send(outcome.clone());
        }
        released
    }

    /// Token installed by the last successful refresh or login
    pub async fn default_token(&self) -> Option<String> {
        self.state.lock().await.default_token.clone()
    }

    pub async fn set_default_token(&self, token: Option<String>) {
        self.state.lock().await.default_token = token;
    }

    pub async fn is_refreshing(&self) -> bool {
        self.state.lock().await.refreshing
    }

    pub async fn queued(&self) -> usize {
        self.state.lock().await.queue.len()
    }
}

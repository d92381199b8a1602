//! Process-wide loading indicator.
//!
//! A single boolean the host shows as a global spinner. `start` and `stop`
//! simply overwrite it, so overlapping loads end when the first one stops.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct LoadingStore {
    state: Arc<watch::Sender<bool>>,
}

impl Default for LoadingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { state: Arc::new(tx) }
    }

    pub fn start(&self) {
        self.state.send_replace(true);
    }

    pub fn stop(&self) {
        self.state.send_replace(false);
    }

    pub fn is_loading(&self) -> bool {
        *self.state.borrow()
    }

    /// Observe indicator changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Start the indicator until the returned guard is dropped
    pub fn begin(&self) -> LoadingGuard {
        self.start();
        LoadingGuard {
            store: self.clone(),
        }
    }
}

/// Stops the loading indicator on drop
#[must_use = "the indicator stops as soon as the guard is dropped"]
pub struct LoadingGuard {
    store: LoadingStore,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.store.stop();
    }
}

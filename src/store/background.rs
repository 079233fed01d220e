//! Write-behind wrapper that keeps blocking saves off the async threads.
//!
//! Saves are queued in call order and written by a single blocking task,
//! so the most recently queued state for a key is the one that lands on
//! disk. Loads go straight to the inner store and can miss writes still in
//! the queue; callers load once at startup, before any save.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::SessionStore;
use crate::conversation::ConversationState;
use crate::error::{EchoError, Result};

type Queued = (String, ConversationState);

/// [`SessionStore`] whose `save` only enqueues.
pub struct BackgroundStore {
    inner: Arc<dyn SessionStore>,
    queue: mpsc::UnboundedSender<Queued>,
}

impl std::fmt::Debug for BackgroundStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundStore")
            .field("writer_running", &!self.queue.is_closed())
            .finish_non_exhaustive()
    }
}

impl BackgroundStore {
    /// Wrap `inner` and start its writer on the blocking pool. Must be
    /// called from within a tokio runtime.
    ///
    /// The returned handle completes after the store is dropped and every
    /// queued write has been attempted.
    pub fn spawn(inner: Arc<dyn SessionStore>) -> (Self, JoinHandle<()>) {
        let (queue, pending) = mpsc::unbounded_channel();
        let writer = Arc::clone(&inner);
        let handle = tokio::task::spawn_blocking(move || write_queued(writer.as_ref(), pending));
        (Self { inner, queue }, handle)
    }
}

impl SessionStore for BackgroundStore {
    fn save(&self, key: &str, state: &ConversationState) -> Result<()> {
        self.queue
            .send((key.to_owned(), state.clone()))
            .map_err(|_| EchoError::Storage("session writer has stopped".into()))
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.inner.load(key)
    }
}

fn write_queued(store: &dyn SessionStore, mut queue: mpsc::UnboundedReceiver<Queued>) {
    while let Some((key, state)) = queue.blocking_recv() {
        // Collapse a burst of saves to the newest state per key.
        let mut latest = HashMap::from([(key, state)]);
        while let Ok((key, state)) = queue.try_recv() {
            latest.insert(key, state);
        }
        for (key, state) in latest {
            if let Err(e) = store.save(&key, &state) {
                warn!(key = %key, error = %e, "background session write failed");
            }
        }
    }
    debug!("session writer drained");
}

//! In-memory session store for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{SessionStore, decode, encode};
use crate::conversation::ConversationState;
use crate::error::Result;

/// In-memory store. Blobs are kept as serialized text so that tests can
/// inject malformed content with [`MemorySessionStore::insert_raw`].
///
/// Thread-safe and cheaply cloneable; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `key` without serialization.
    pub fn insert_raw(&self, key: &str, raw: impl Into<String>) {
        self.lock().insert(key.to_owned(), raw.into());
    }

    /// Raw text stored under `key`, if any.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, key: &str, state: &ConversationState) -> Result<()> {
        let json = encode(state)?;
        self.lock().insert(key.to_owned(), json);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.raw(key) {
            Some(raw) => decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }
}

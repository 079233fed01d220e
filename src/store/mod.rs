//! Persistence for the single conversation slot.
//!
//! A [`SessionStore`] holds serialized [`ConversationState`] blobs under a
//! string key. Loading returns the raw JSON value so callers can validate
//! it structurally before trusting it
//! (see [`crate::conversation::validate_state`]).
//!
//! # Examples
//!
//! ```
//! use ink_echo::conversation::ConversationState;
//! use ink_echo::store::{MemorySessionStore, SessionStore};
//!
//! let store = MemorySessionStore::new();
//! let state = ConversationState::new("sess-1");
//! store.save("slot", &state).unwrap_or_default();
//! assert!(store.load("slot").unwrap_or_default().is_some());
//! ```

pub mod background;
pub mod fs;
pub mod memory;

pub use background::BackgroundStore;
pub use fs::FsSessionStore;
pub use memory::MemorySessionStore;

use crate::conversation::ConversationState;
use crate::error::Result;

/// Key-value persistence of conversation state.
///
/// Operations are synchronous. Backends that touch the disk are wrapped in
/// a [`BackgroundStore`] inside the async application so that saving
/// never blocks a runtime thread.
pub trait SessionStore: Send + Sync {
    /// Serialize and store `state` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Storage`] if serialization or the write fails.
    fn save(&self, key: &str, state: &ConversationState) -> Result<()>;

    /// Load the raw blob stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Storage`] if the blob exists but cannot be
    /// read or is not valid JSON.
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;
}

/// Serialize state the same way for every backend.
pub(crate) fn encode(state: &ConversationState) -> Result<String> {
    serde_json::to_string(state)
        .map_err(|e| crate::EchoError::Storage(format!("failed to serialize session: {e}")))
}

/// Parse a stored blob into a raw JSON value.
pub(crate) fn decode(key: &str, raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw)
        .map_err(|e| crate::EchoError::Storage(format!("failed to parse session `{key}`: {e}")))
}

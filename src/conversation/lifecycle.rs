//! Write-through owner of the persisted [`ConversationState`].

use std::sync::Arc;

use super::types::{ConversationState, Message, Role};
use super::validation::validate_state;
use crate::api::VisionAnalysis;
use crate::config::ConversationConfig;
use crate::store::SessionStore;

/// Owns the conversation state and persists it after every mutation.
///
/// Persistence failures are logged and otherwise ignored: the in-memory
/// state stays authoritative for the running process.
pub struct ConversationManager {
    state: ConversationState,
    max_turns: u32,
    storage_key: String,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("state", &self.state)
            .field("max_turns", &self.max_turns)
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}

impl ConversationManager {
    /// Restore the persisted session, or start a fresh one when the stored
    /// blob is absent, unreadable, or structurally invalid.
    pub fn restore(store: Arc<dyn SessionStore>, config: &ConversationConfig) -> Self {
        let key = config.storage_key.clone();
        let restored = match store.load(&key) {
            Ok(Some(blob)) => match validate_state(&blob) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding invalid persisted session");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to load persisted session");
                None
            }
        };

        match restored {
            Some(state) => {
                tracing::info!(
                    session_id = %state.id,
                    turns = state.turns,
                    messages = state.history.len(),
                    "restored session"
                );
                Self {
                    state,
                    max_turns: config.max_turns,
                    storage_key: key,
                    store,
                }
            }
            None => {
                let manager = Self {
                    state: ConversationState::fresh(),
                    max_turns: config.max_turns,
                    storage_key: key,
                    store,
                };
                tracing::info!(session_id = %manager.state.id, "started new session");
                manager.persist();
                manager
            }
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// Assistant replies since the session started or last resumed.
    pub fn turns(&self) -> u32 {
        self.state.turns
    }

    /// Turn number the next assistant reply will carry.
    pub fn next_turn(&self) -> u32 {
        self.state.turns.saturating_add(1)
    }

    /// Configured turn limit.
    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Chronological transcript.
    pub fn history(&self) -> &[Message] {
        &self.state.history
    }

    /// Whether the turn limit has been reached.
    pub fn is_session_ended(&self) -> bool {
        self.state.is_session_ended
    }

    /// Whether a photo upload is expected.
    pub fn is_waiting_vision(&self) -> bool {
        self.state.is_waiting_vision
    }

    /// Append a message. Assistant messages advance the turn counter.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.state.history.push(Message::new(role, content));
        if role == Role::Assistant {
            self.state.turns = self.state.turns.saturating_add(1);
        }
        self.state.is_session_ended = self.state.turns >= self.max_turns;
        if role == Role::Assistant && self.state.is_session_ended {
            tracing::info!(
                session_id = %self.state.id,
                turns = self.state.turns,
                "turn limit reached"
            );
        }
        self.persist();
    }

    /// Resume after a photo analysis: append the feedback as an assistant
    /// message, reset the turn counter and clear both flags.
    pub fn resume_session_with_vision(&mut self, analysis: &VisionAnalysis) {
        self.state
            .history
            .push(Message::assistant(analysis.feedback.clone()));
        self.state.turns = 0;
        self.state.is_session_ended = false;
        self.state.is_waiting_vision = false;
        tracing::info!(session_id = %self.state.id, "session resumed with vision feedback");
        self.persist();
    }

    /// Enter upload-waiting mode without touching turns or history.
    pub fn start_upload_mode(&mut self) {
        self.state.is_waiting_vision = true;
        self.persist();
    }

    /// Discard everything and start a new session.
    pub fn reset_session(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConversationState::fresh());
        tracing::info!(
            previous = %previous.id,
            session_id = %self.state.id,
            "session reset"
        );
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.storage_key, &self.state) {
            tracing::warn!(
                session_id = %self.state.id,
                error = %e,
                "failed to persist session"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EchoError, Result};
    use crate::store::MemorySessionStore;

    const KEY: &str = "ink-echo-session";

    fn config(max_turns: u32) -> ConversationConfig {
        ConversationConfig {
            max_turns,
            storage_key: KEY.to_owned(),
        }
    }

    fn manager() -> (MemorySessionStore, ConversationManager) {
        let store = MemorySessionStore::new();
        let mgr = ConversationManager::restore(Arc::new(store.clone()), &config(7));
        (store, mgr)
    }

    fn persisted(store: &MemorySessionStore) -> ConversationState {
        match store.load(KEY) {
            Ok(Some(blob)) => match validate_state(&blob) {
                Ok(s) => s,
                Err(e) => unreachable!("persisted blob invalid: {e}"),
            },
            other => unreachable!("nothing persisted: {other:?}"),
        }
    }

    fn analysis(feedback: &str) -> VisionAnalysis {
        VisionAnalysis {
            feedback: feedback.to_owned(),
            ..VisionAnalysis::default()
        }
    }

    #[test]
    fn fresh_session_is_persisted_immediately() {
        let (store, mgr) = manager();
        assert_eq!(mgr.turns(), 0);
        assert_eq!(persisted(&store).id, mgr.id());
    }

    #[test]
    fn user_messages_do_not_advance_turns() {
        let (_store, mut mgr) = manager();
        mgr.add_message(Role::User, "hello");
        mgr.add_message(Role::User, "again");
        assert_eq!(mgr.turns(), 0);
        assert_eq!(mgr.history().len(), 2);
    }

    #[test]
    fn reaching_max_turns_ends_session() {
        let (_store, mut mgr) = manager();
        for _ in 0..6 {
            mgr.add_message(Role::Assistant, "reply");
        }
        assert_eq!(mgr.turns(), 6);
        assert!(!mgr.is_session_ended());

        mgr.add_message(Role::Assistant, "last");
        assert_eq!(mgr.turns(), 7);
        assert!(mgr.is_session_ended());
    }

    #[test]
    fn six_pairs_then_seventh_reply_ends_session() {
        let (store, mut mgr) = manager();
        for i in 0..6 {
            mgr.add_message(Role::User, format!("u{i}"));
            mgr.add_message(Role::Assistant, format!("a{i}"));
        }
        assert_eq!(mgr.turns(), 6);
        assert!(!mgr.is_session_ended());

        mgr.add_message(Role::User, "u6");
        mgr.add_message(Role::Assistant, "a6");
        assert_eq!(mgr.turns(), 7);
        assert!(mgr.is_session_ended());
        assert_eq!(persisted(&store).history.len(), 14);
    }

    #[test]
    fn resume_with_vision_resets_turns_and_flags() {
        let (store, mut mgr) = manager();
        for _ in 0..7 {
            mgr.add_message(Role::Assistant, "reply");
        }
        mgr.start_upload_mode();
        assert!(mgr.is_waiting_vision());

        mgr.resume_session_with_vision(&analysis("great card"));
        assert_eq!(mgr.turns(), 0);
        assert!(!mgr.is_session_ended());
        assert!(!mgr.is_waiting_vision());
        assert_eq!(
            mgr.history().last(),
            Some(&Message::assistant("great card"))
        );
        assert_eq!(persisted(&store).turns, 0);
    }

    #[test]
    fn upload_mode_leaves_turns_and_history_alone() {
        let (_store, mut mgr) = manager();
        mgr.add_message(Role::Assistant, "one");
        mgr.start_upload_mode();
        assert!(mgr.is_waiting_vision());
        assert!(!mgr.is_session_ended());
        assert_eq!(mgr.turns(), 1);
        assert_eq!(mgr.history().len(), 1);
    }

    #[test]
    fn reset_issues_new_id_and_clears_history() {
        let (store, mut mgr) = manager();
        let old_id = mgr.id().to_owned();
        mgr.add_message(Role::User, "hi");
        mgr.add_message(Role::Assistant, "hello");
        mgr.reset_session();
        assert_ne!(mgr.id(), old_id);
        assert_eq!(mgr.turns(), 0);
        assert!(mgr.history().is_empty());
        assert_eq!(persisted(&store).id, mgr.id());
    }

    #[test]
    fn valid_persisted_state_is_restored() {
        let store = MemorySessionStore::new();
        let mut state = ConversationState::new("kept");
        state.turns = 3;
        state.history.push(Message::user("hi"));
        assert!(store.save(KEY, &state).is_ok());

        let mgr = ConversationManager::restore(Arc::new(store), &config(7));
        assert_eq!(mgr.id(), "kept");
        assert_eq!(mgr.turns(), 3);
        assert_eq!(mgr.history().len(), 1);
    }

    #[test]
    fn turns_stored_as_string_starts_fresh() {
        let store = MemorySessionStore::new();
        store.insert_raw(
            KEY,
            r#"{"id":"bad","turns":"3","history":[],"isSessionEnded":false,"isWaitingVision":false}"#,
        );
        let mgr = ConversationManager::restore(Arc::new(store.clone()), &config(7));
        assert_ne!(mgr.id(), "bad");
        assert_eq!(mgr.turns(), 0);
        assert!(mgr.history().is_empty());
        assert_eq!(persisted(&store).id, mgr.id());
    }

    #[test]
    fn unparseable_blob_starts_fresh() {
        let store = MemorySessionStore::new();
        store.insert_raw(KEY, "not json at all");
        let mgr = ConversationManager::restore(Arc::new(store), &config(7));
        assert_eq!(mgr.turns(), 0);
    }

    #[derive(Debug)]
    struct FailingStore;

    impl SessionStore for FailingStore {
        fn save(&self, _key: &str, _state: &ConversationState) -> Result<()> {
            Err(EchoError::Storage("disk full".into()))
        }
        fn load(&self, _key: &str) -> Result<Option<serde_json::Value>> {
            Err(EchoError::Storage("unreadable".into()))
        }
    }

    #[test]
    fn storage_failures_never_disturb_state() {
        let mut mgr = ConversationManager::restore(Arc::new(FailingStore), &config(2));
        mgr.add_message(Role::User, "a");
        mgr.add_message(Role::Assistant, "b");
        mgr.add_message(Role::Assistant, "c");
        assert_eq!(mgr.turns(), 2);
        assert!(mgr.is_session_ended());
    }
}

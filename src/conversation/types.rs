//! Core conversation types.
//!
//! The persisted JSON layout uses camelCase keys:
//!
//! ```
//! use ink_echo::conversation::{ConversationState, Message};
//!
//! let mut state = ConversationState::new("sess-1");
//! state.history.push(Message::user("hello"));
//! let json = serde_json::to_value(&state).unwrap_or_default();
//! assert_eq!(json["isSessionEnded"], false);
//! assert_eq!(json["history"][0]["role"], "user");
//! ```

use serde::{Deserialize, Serialize};

/// Unique session identifier.
pub type SessionId = String;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person journaling.
    User,
    /// The companion.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a wire name. Only `user` and `assistant` are valid.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One entry of the chronological transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Complete persisted conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    /// Opaque session identifier.
    pub id: SessionId,
    /// Assistant replies since the session started or last resumed.
    pub turns: u32,
    /// Append-only transcript.
    pub history: Vec<Message>,
    /// Set once `turns` reaches the configured maximum.
    pub is_session_ended: bool,
    /// Set while a photo upload is expected.
    pub is_waiting_vision: bool,
}

impl ConversationState {
    /// Empty state with the given id.
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            turns: 0,
            history: Vec::new(),
            is_session_ended: false,
            is_waiting_vision: false,
        }
    }

    /// Empty state with a fresh random id.
    pub fn fresh() -> Self {
        Self::new(generate_session_id())
    }
}

/// Generate a random session identifier (UUID v4).
pub fn generate_session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string()
}

/// Ephemeral microphone state shown by a UI. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingState {
    /// Recording was requested and has not been stopped.
    pub is_recording: bool,
    /// The underlying stream is believed to be listening.
    pub is_listening: bool,
    /// Accumulated final text plus the current interim hypothesis.
    pub transcript: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
        assert_eq!(Role::parse("User"), None);
    }

    #[test]
    fn fresh_state_is_empty_with_unique_id() {
        let a = ConversationState::fresh();
        let b = ConversationState::fresh();
        assert_ne!(a.id, b.id);
        assert_eq!(a.turns, 0);
        assert!(a.history.is_empty());
        assert!(!a.is_session_ended);
        assert!(!a.is_waiting_vision);
    }

    #[test]
    fn state_serializes_with_camel_case_keys() {
        let mut state = ConversationState::new("abc");
        state.turns = 2;
        state.is_waiting_vision = true;
        state.history.push(Message::assistant("hi"));
        let json = match serde_json::to_value(&state) {
            Ok(v) => v,
            Err(e) => unreachable!("serialize failed: {e}"),
        };
        assert_eq!(json["id"], "abc");
        assert_eq!(json["turns"], 2);
        assert_eq!(json["isWaitingVision"], true);
        assert_eq!(json["history"][0]["role"], "assistant");
        assert!(json.get("is_session_ended").is_none());
    }
}

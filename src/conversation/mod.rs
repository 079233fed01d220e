//! Conversation lifecycle: identity, history, turn counting and the
//! session-ended / upload-waiting flags, persisted through a
//! [`SessionStore`](crate::store::SessionStore).
//!
//! # Submodules
//!
//! - [`types`]: `Message`, `Role`, `ConversationState`, `RecordingState`
//! - [`validation`]: structural validation of persisted blobs
//! - [`lifecycle`]: `ConversationManager`, the write-through state owner

pub mod lifecycle;
pub mod types;
pub mod validation;

pub use lifecycle::ConversationManager;
pub use types::{
    ConversationState, Message, RecordingState, Role, SessionId, generate_session_id,
};
pub use validation::{StateValidationError, validate_state};

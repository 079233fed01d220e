//! Structural validation of persisted conversation state.
//!
//! Loaded blobs are untrusted: they may come from an older build, a manual
//! edit, or a truncated write. [`validate_state`] checks every field's
//! presence and type before the blob is turned into a [`ConversationState`].

use serde_json::Value;

use super::types::{ConversationState, Message, Role};

/// Why a persisted blob was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateValidationError {
    /// The top-level value is not a JSON object.
    #[error("state is not an object")]
    NotAnObject,
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field has the wrong JSON type or an out-of-range value.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Human-readable expectation.
        expected: &'static str,
    },
    /// A history entry is malformed.
    #[error("history entry {index} is invalid: {reason}")]
    InvalidMessage {
        /// Position in `history`.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
}

/// Validate a loaded blob and convert it to a [`ConversationState`].
///
/// # Errors
///
/// Returns the first structural violation found.
pub fn validate_state(value: &Value) -> Result<ConversationState, StateValidationError> {
    let obj = value.as_object().ok_or(StateValidationError::NotAnObject)?;

    let id = match obj.get("id") {
        None => return Err(StateValidationError::MissingField("id")),
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(_) => {
            return Err(StateValidationError::WrongType {
                field: "id",
                expected: "a non-empty string",
            });
        }
    };

    let turns = match obj.get("turns") {
        None => return Err(StateValidationError::MissingField("turns")),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(StateValidationError::WrongType {
                field: "turns",
                expected: "a non-negative integer",
            })?,
    };

    let is_session_ended = required_bool(obj, "isSessionEnded")?;
    let is_waiting_vision = required_bool(obj, "isWaitingVision")?;

    let entries = match obj.get("history") {
        None => return Err(StateValidationError::MissingField("history")),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(StateValidationError::WrongType {
                field: "history",
                expected: "an array",
            });
        }
    };

    let mut history = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        history.push(validate_message(index, entry)?);
    }

    Ok(ConversationState {
        id,
        turns,
        history,
        is_session_ended,
        is_waiting_vision,
    })
}

fn required_bool(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<bool, StateValidationError> {
    match obj.get(field) {
        None => Err(StateValidationError::MissingField(field)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(StateValidationError::WrongType {
            field,
            expected: "a boolean",
        }),
    }
}

fn validate_message(index: usize, entry: &Value) -> Result<Message, StateValidationError> {
    let invalid = |reason: &str| StateValidationError::InvalidMessage {
        index,
        reason: reason.to_owned(),
    };

    let obj = entry.as_object().ok_or_else(|| invalid("not an object"))?;
    let role = obj
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("role must be a string"))?;
    let role = Role::parse(role).ok_or_else(|| invalid("role must be `user` or `assistant`"))?;
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("content must be a string"))?;

    Ok(Message::new(role, content))
}

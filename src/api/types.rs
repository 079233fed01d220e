//! Wire types shared by the HTTP client and the API server.

use serde::{Deserialize, Serialize};

use crate::conversation::Message;

/// `POST /api/mistral/chat` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Turn number the reply will carry. Defaults to 1 server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// Successful chat payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Assistant reply text.
    pub content: String,
}

/// `POST /api/mistral/vision` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRequest {
    /// Photo as a `data:` URI (or bare base64).
    pub image: String,
    /// Conversation history for context.
    pub messages: Vec<Message>,
    /// Current turn number, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// Structured analysis of a handwritten note.
///
/// Only `feedback` is guaranteed: a degraded fallback response carries
/// nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionAnalysis {
    /// Transcribed handwriting.
    pub text: String,
    /// Main themes.
    pub themes: Vec<String>,
    /// Keywords.
    pub keywords: Vec<String>,
    /// One-sentence summary.
    pub main_idea: String,
    /// Links to the preceding conversation.
    pub connections: Vec<String>,
    /// Reply spoken back to the user.
    pub feedback: String,
}

/// `POST /api/elevenlabs/tts` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsRequest {
    /// Text to speak.
    pub text: String,
    /// Turn number; selects the tone when stability/style are absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
    /// Voice override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Voice stability override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,
    /// Style override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<f32>,
}

/// Stable error codes carried in the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// Malformed or incomplete request.
    InvalidRequest,
    /// Wrong HTTP method.
    MethodNotAllowed,
    /// The server has no key for the upstream provider.
    MissingApiKey,
    /// The upstream provider failed.
    ApiError,
    /// Anything else.
    InternalError,
}

impl ApiErrorCode {
    /// Wire name of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::MissingApiKey => "MISSING_API_KEY",
            Self::ApiError => "API_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success envelope: `{ "data": ..., "success": true }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    /// Payload.
    pub data: T,
    /// Always `true`.
    pub success: bool,
}

impl<T> ApiSuccess<T> {
    /// Wrap a payload.
    pub fn new(data: T) -> Self {
        Self {
            data,
            success: true,
        }
    }
}

/// Error envelope: `{ "error": ..., "code": ..., "success": false }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    /// Human-readable message.
    pub error: String,
    /// Stable code.
    pub code: ApiErrorCode,
    /// Always `false`.
    pub success: bool,
}

impl ApiFailure {
    /// Build an error envelope.
    pub fn new(code: ApiErrorCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code,
            success: false,
        }
    }
}

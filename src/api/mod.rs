//! The three external capabilities the companion depends on (chat, vision,
//! speech synthesis), their wire types, and an HTTP client implementing
//! them against the API server.

pub mod client;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use client::{ApiClient, SPAN_API_REQUEST};
pub use types::{
    ApiErrorCode, ApiFailure, ApiSuccess, ChatReply, ChatRequest, TtsRequest, VisionAnalysis,
    VisionRequest,
};

use crate::error::Result;

/// Chat completion with server-side prompt injection.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send the history and turn number; returns the assistant reply.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Chat`] on transport or upstream failure.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;
}

/// Handwriting analysis of an uploaded photo.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Analyze the photo in `request`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Vision`] on transport or upstream failure.
    async fn analyze(&self, request: &VisionRequest) -> Result<VisionAnalysis>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request.text`; returns the encoded audio payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Tts`] on transport or upstream failure.
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes>;
}

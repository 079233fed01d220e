//! reqwest client for the chat, vision and TTS endpoints.
//!
//! # Examples
//!
//! ```no_run
//! use ink_echo::api::{ApiClient, ChatRequest, ChatService};
//! use ink_echo::config::ClientConfig;
//! use ink_echo::conversation::Message;
//!
//! # async fn demo() -> ink_echo::Result<()> {
//! let client = ApiClient::new(&ClientConfig::default())?;
//! let reply = client
//!     .chat(&ChatRequest { messages: vec![Message::user("hi")], turn: Some(1) })
//!     .await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, info, warn};

use super::types::{ApiFailure, ApiSuccess};
use super::{
    ChatReply, ChatRequest, ChatService, SpeechSynthesizer, TtsRequest, VisionAnalysis,
    VisionRequest, VisionService,
};
use crate::config::ClientConfig;
use crate::error::{EchoError, Result};

const CHAT_PATH: &str = "/api/mistral/chat";
const VISION_PATH: &str = "/api/mistral/vision";
const TTS_PATH: &str = "/api/elevenlabs/tts";

/// Span wrapping every request to the API server.
pub const SPAN_API_REQUEST: &str = "ink_echo.api.request";

/// HTTP client for the API server. One instance serves all three
/// capabilities and is meant to be shared.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EchoError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Client for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Config`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(&ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> reqwest::Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let span = tracing::info_span!(SPAN_API_REQUEST, endpoint = %path);
        async {
            let started = Instant::now();
            debug!(%url, "request started");
            let result = self.client.post(&url).json(body).send().await;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match &result {
                Ok(response) => {
                    info!(status = response.status().as_u16(), duration_ms, "request finished");
                }
                Err(e) => warn!(error = %e, duration_ms, "request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// POST and unwrap a JSON success envelope. `wrap` maps a message to the
    /// caller's error variant.
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        wrap: fn(String) -> EchoError,
    ) -> Result<T> {
        let response = self
            .post(path, body)
            .await
            .map_err(|e| wrap(format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| wrap(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(wrap(error_message(status, &text)));
        }

        let envelope: ApiSuccess<T> = serde_json::from_str(&text)
            .map_err(|e| wrap(format!("unexpected response body: {e}")))?;
        if !envelope.success {
            return Err(wrap(error_message(status, &text)));
        }
        Ok(envelope.data)
    }
}

/// Prefer the envelope's `error` text; fall back to a generic message.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiFailure>(body) {
        Ok(failure) => failure.error,
        Err(_) => format!("HTTP {}", status.as_u16()),
    }
}

#[async_trait]
impl ChatService for ApiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.post_json(CHAT_PATH, request, EchoError::Chat).await
    }
}

#[async_trait]
impl VisionService for ApiClient {
    async fn analyze(&self, request: &VisionRequest) -> Result<VisionAnalysis> {
        self.post_json(VISION_PATH, request, EchoError::Vision).await
    }
}

#[async_trait]
impl SpeechSynthesizer for ApiClient {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes> {
        let response = self
            .post(TTS_PATH, request)
            .await
            .map_err(|e| EchoError::Tts(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EchoError::Tts(error_message(status, &text)));
        }
        let audio = response
            .bytes()
            .await
            .map_err(|e| EchoError::Tts(format!("failed to read audio: {e}")))?;
        if audio.is_empty() {
            return Err(EchoError::Tts("empty audio payload".into()));
        }
        Ok(audio)
    }
}

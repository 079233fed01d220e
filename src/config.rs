//! Configuration types for the journaling companion and its API server.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EchoError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Turn limit and persistence slot.
    pub conversation: ConversationConfig,
    /// Continuous recognition timing and retry policy.
    pub recognition: RecognitionConfig,
    /// Speech playback settings.
    pub playback: PlaybackConfig,
    /// Feature flags.
    pub features: FeatureFlags,
    /// HTTP client settings for the chat / vision / TTS endpoints.
    pub client: ClientConfig,
    /// API server settings (upstream providers, bind address).
    pub server: ServerConfig,
}

/// Conversation lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Assistant replies per session before the photo step is requested.
    pub max_turns: u32,
    /// Key under which the session blob is persisted.
    pub storage_key: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 7,
            storage_key: "ink-echo-session".to_owned(),
        }
    }
}

/// Continuous recognition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP-47 language tag handed to the recognizer.
    pub language: String,
    /// Pause after the last final fragment before an utterance is delivered.
    pub silence_window_ms: u64,
    /// Delay before restarting the stream after a network error.
    pub retry_delay_ms: u64,
    /// Consecutive network errors tolerated before recording stops.
    pub max_transient_errors: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "ja-JP".to_owned(),
            silence_window_ms: 3_000,
            retry_delay_ms: 1_000,
            max_transient_errors: 3,
        }
    }
}

impl RecognitionConfig {
    /// Silence window as a [`Duration`].
    pub fn silence_window(&self) -> Duration {
        Duration::from_millis(self.silence_window_ms)
    }

    /// Retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Upper bound after which an active playback is released even if the
    /// output never reported completion.
    pub safety_timeout_ms: u64,
    /// Output device name. `None` uses the system default.
    pub output_device: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            safety_timeout_ms: 60_000,
            output_device: None,
        }
    }
}

impl PlaybackConfig {
    /// Safety timeout as a [`Duration`].
    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety_timeout_ms)
    }
}

/// Feature flags, read-only to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// When a photo analysis fails, answer with an empathetic template
    /// instead of an honest error.
    pub vision_fallback: bool,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the API server (without trailing `/api`).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_owned(),
            timeout_secs: 30,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (`host:port`, port `0` auto-assigns).
    pub bind_addr: String,
    /// Mistral API base URL.
    pub mistral_base_url: String,
    /// Chat completion model.
    pub chat_model: String,
    /// Vision model for handwritten note analysis.
    pub vision_model: String,
    /// Sampling temperature for both chat and vision.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Maximum generated tokens.
    pub max_tokens: u32,
    /// ElevenLabs API base URL.
    pub elevenlabs_base_url: String,
    /// Default ElevenLabs voice.
    pub voice_id: String,
    /// ElevenLabs model.
    pub tts_model: String,
    /// Upstream request timeout in seconds.
    pub upstream_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_owned(),
            mistral_base_url: "https://api.mistral.ai".to_owned(),
            chat_model: "mistral-large-latest".to_owned(),
            vision_model: "pixtral-12b".to_owned(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1000,
            elevenlabs_base_url: "https://api.elevenlabs.io".to_owned(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_owned(),
            tts_model: "eleven_multilingual_v2".to_owned(),
            upstream_timeout_secs: 30,
        }
    }
}

impl EchoConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EchoError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EchoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::dirs::config_file()
    }

    /// Load from `path` (or the default path when it exists), then apply
    /// environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file fails to load or the merged
    /// configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognized keys: `INK_ECHO_MAX_TURNS`, `ENABLE_VISION_FALLBACK`,
    /// `INK_ECHO_ENABLE_VISION_FALLBACK`, `INK_ECHO_API_BASE_URL`,
    /// `INK_ECHO_BIND_ADDR`. Unparseable values are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("INK_ECHO_MAX_TURNS") {
            match raw.trim().parse::<u32>() {
                Ok(n) => self.conversation.max_turns = n,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid INK_ECHO_MAX_TURNS"),
            }
        }
        for key in ["ENABLE_VISION_FALLBACK", "INK_ECHO_ENABLE_VISION_FALLBACK"] {
            if let Some(raw) = lookup(key) {
                self.features.vision_fallback = parse_flag(&raw);
            }
        }
        if let Some(url) = lookup("INK_ECHO_API_BASE_URL") {
            self.client.base_url = url;
        }
        if let Some(addr) = lookup("INK_ECHO_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.conversation.max_turns == 0 {
            return Err(EchoError::Config("max_turns must be greater than 0".into()));
        }
        if self.conversation.storage_key.trim().is_empty() {
            return Err(EchoError::Config("storage_key must not be empty".into()));
        }
        if self.recognition.silence_window_ms == 0 {
            return Err(EchoError::Config(
                "silence_window_ms must be greater than 0".into(),
            ));
        }
        if self.playback.safety_timeout_ms == 0 {
            return Err(EchoError::Config(
                "safety_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.client.timeout_secs == 0 {
            return Err(EchoError::Config("timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }
}

/// `"true"` and `"1"` enable a flag; anything else disables it.
fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "1")
}

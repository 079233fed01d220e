//! HTTP API server fronting the chat, vision and speech providers.
//!
//! Clients never see provider keys or prompts: the server injects the
//! turn-escalated system prompt, calls Mistral or ElevenLabs, and answers
//! in the `{ data, success }` / `{ error, code, success }` envelope.
//!
//! ## Endpoints
//!
//! - `POST /api/mistral/chat`: reflective chat reply for a history and turn
//! - `POST /api/mistral/vision`: handwritten note analysis
//! - `POST /api/elevenlabs/tts`: streamed `audio/mpeg` speech
//! - `GET /api/health`: liveness and configured providers

mod error;
pub mod fallback;
mod handlers;
pub mod middleware;
pub mod prompts;
mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{FeatureFlags, ServerConfig};
use crate::error::{EchoError, Result};
use self::error::ApiError;

/// Largest accepted request body. Photos arrive base64-encoded.
pub(crate) const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const MISTRAL_KEY_VAR: &str = "MISTRAL_API_KEY";
const ELEVENLABS_KEY_VAR: &str = "ELEVENLABS_API_KEY";

/// Provider API keys. Only ever read from the environment.
#[derive(Clone, Default)]
pub struct ApiKeys {
    mistral: Option<String>,
    elevenlabs: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("mistral", &self.has_mistral())
            .field("elevenlabs", &self.has_elevenlabs())
            .finish()
    }
}

impl ApiKeys {
    /// Keys from explicit values. Blank values count as missing.
    pub fn new(mistral: Option<String>, elevenlabs: Option<String>) -> Self {
        let present = |k: Option<String>| k.filter(|s| !s.trim().is_empty());
        Self {
            mistral: present(mistral),
            elevenlabs: present(elevenlabs),
        }
    }

    /// Keys from `MISTRAL_API_KEY` and `ELEVENLABS_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(MISTRAL_KEY_VAR).ok(),
            std::env::var(ELEVENLABS_KEY_VAR).ok(),
        )
    }

    /// Whether a Mistral key is configured.
    pub fn has_mistral(&self) -> bool {
        self.mistral.is_some()
    }

    /// Whether an ElevenLabs key is configured.
    pub fn has_elevenlabs(&self) -> bool {
        self.elevenlabs.is_some()
    }

    /// Names of the variables that are not set.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if !self.has_mistral() {
            names.push(MISTRAL_KEY_VAR);
        }
        if !self.has_elevenlabs() {
            names.push(ELEVENLABS_KEY_VAR);
        }
        names
    }

    pub(crate) fn mistral(&self) -> std::result::Result<&str, ApiError> {
        self.mistral
            .as_deref()
            .ok_or_else(|| ApiError::missing_keys(&[MISTRAL_KEY_VAR]))
    }

    pub(crate) fn elevenlabs(&self) -> std::result::Result<&str, ApiError> {
        self.elevenlabs
            .as_deref()
            .ok_or_else(|| ApiError::missing_keys(&[ELEVENLABS_KEY_VAR]))
    }
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    http: reqwest::Client,
    config: Arc<ServerConfig>,
    features: FeatureFlags,
    keys: Arc<ApiKeys>,
}

/// Build the API router.
///
/// # Errors
///
/// Returns [`EchoError::Config`] if the upstream HTTP client cannot be built.
pub fn router(config: ServerConfig, features: FeatureFlags, keys: ApiKeys) -> Result<Router> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upstream_timeout_secs))
        .build()
        .map_err(|e| EchoError::Config(format!("failed to build upstream client: {e}")))?;
    let state = AppState {
        http,
        config: Arc::new(config),
        features,
        keys: Arc::new(keys),
    };

    let app = Router::new()
        .route(
            "/api/mistral/chat",
            post(handlers::chat).fallback(middleware::method_not_allowed),
        )
        .route(
            "/api/mistral/vision",
            post(handlers::vision).fallback(middleware::method_not_allowed),
        )
        .route(
            "/api/elevenlabs/tts",
            post(handlers::tts).fallback(middleware::method_not_allowed),
        )
        .route(
            "/api/health",
            get(handlers::health).fallback(middleware::method_not_allowed),
        )
        .fallback(middleware::not_found)
        .layer(axum::middleware::from_fn(middleware::require_body))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::cors))
        .layer(axum::middleware::from_fn(middleware::trace_requests))
        .with_state(state);
    Ok(app)
}

/// The running API server.
pub struct EchoServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl EchoServer {
    /// Bind `config.bind_addr` (port `0` auto-assigns) and serve in a
    /// background task.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Server`] if the listener cannot bind and
    /// [`EchoError::Config`] if the router cannot be built.
    pub async fn start(config: ServerConfig, features: FeatureFlags, keys: ApiKeys) -> Result<Self> {
        let missing = keys.missing();
        if !missing.is_empty() {
            warn!(missing = ?missing, "provider keys missing, affected endpoints will fail");
        }

        let bind_addr = config.bind_addr.clone();
        let app = router(config, features, keys)?;
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| EchoError::Server(format!("bind to {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| EchoError::Server(format!("failed to get local addr: {e}")))?;

        info!("API server listening on http://{addr}/api");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL suitable for [`ClientConfig::base_url`](crate::config::ClientConfig).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_missing() {
        let keys = ApiKeys::new(Some("  ".into()), Some("el-key".into()));
        assert!(!keys.has_mistral());
        assert!(keys.has_elevenlabs());
        assert_eq!(keys.missing(), vec![MISTRAL_KEY_VAR]);
        assert!(keys.mistral().is_err());
        assert_eq!(keys.elevenlabs().ok(), Some("el-key"));
    }

    #[test]
    fn debug_never_prints_keys() {
        let keys = ApiKeys::new(Some("secret-m".into()), Some("secret-e".into()));
        let rendered = format!("{keys:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("mistral: true"));
    }

    #[test]
    fn router_builds_with_defaults() {
        assert!(router(ServerConfig::default(), FeatureFlags::default(), ApiKeys::default()).is_ok());
    }
}

//! Calls to the upstream providers (Mistral chat completions, ElevenLabs
//! text-to-speech).

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Upstream call failure. `Display` is the text returned to clients.
#[derive(Debug, thiserror::Error)]
pub(crate) enum UpstreamError {
    /// The request never produced a response.
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx status; carries the provider's message when it sent one.
    #[error("{0}")]
    Rejected(String),

    /// 2xx with a body we could not decode.
    #[error("invalid response from {provider}: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The completion had no message content.
    #[error("No response from {0}")]
    Empty(&'static str),
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `POST {base}/v1/chat/completions`; returns the first choice's content.
pub(crate) async fn chat_completion(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &Value,
    provider: &'static str,
) -> Result<String, UpstreamError> {
    let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
    debug!(%url, provider, "calling chat completions");
    let response = http
        .post(&url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|source| UpstreamError::Transport { provider, source })?;

    let response = check_status(response, provider).await?;
    let parsed: CompletionResponse = response
        .json()
        .await
        .map_err(|source| UpstreamError::Decode { provider, source })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(UpstreamError::Empty(provider))
}

/// `POST {base}/v1/text-to-speech/{voice_id}`; returns the streaming
/// response once the status is known to be successful.
pub(crate) async fn text_to_speech(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    voice_id: &str,
    body: &Value,
) -> Result<reqwest::Response, UpstreamError> {
    const PROVIDER: &str = "ElevenLabs API";
    let url = format!(
        "{}/v1/text-to-speech/{voice_id}",
        base_url.trim_end_matches('/')
    );
    debug!(%url, "calling text-to-speech");
    let response = http
        .post(&url)
        .header("xi-api-key", api_key)
        .json(body)
        .send()
        .await
        .map_err(|source| UpstreamError::Transport {
            provider: PROVIDER,
            source,
        })?;
    check_status(response, PROVIDER).await
}

async fn check_status(
    response: reqwest::Response,
    provider: &'static str,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(provider, status = status.as_u16(), "upstream rejected request");
    Err(UpstreamError::Rejected(
        provider_message(&body).unwrap_or_else(|| format!("{provider} error")),
    ))
}

/// Best-effort extraction of a provider's error text. Accepts
/// `{"error": "..."}`, `{"error": {"message": "..."}}`, `{"message": "..."}`
/// and `{"detail": {"message": "..."}}`.
fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        value.get("error"),
        value.get("error").and_then(|e| e.get("message")),
        value.get("message"),
        value.get("detail").and_then(|d| d.get("message")),
        value.get("detail"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
        .map(str::to_owned)
}

//! Route handlers.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::AppState;
use super::error::ApiError;
use super::fallback;
use super::prompts;
use super::upstream;
use crate::api::{ApiSuccess, ChatReply, VisionAnalysis};
use crate::conversation::Message;
use crate::language;
use crate::playback::tone_for_turn;

const MISTRAL_CHAT: &str = "Mistral API";
const MISTRAL_VISION: &str = "Mistral Vision API";

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    messages: Option<Vec<Message>>,
    #[serde(default)]
    turn: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VisionBody {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    messages: Option<Vec<Message>>,
    #[serde(default)]
    turn: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    turn: Option<u32>,
    #[serde(default, alias = "voice_id")]
    voice_id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stability: Option<f32>,
    #[serde(default)]
    style: Option<f32>,
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::invalid(format!("Invalid request body: {e}")))
}

fn non_empty_messages(messages: Option<Vec<Message>>) -> Result<Vec<Message>, ApiError> {
    match messages {
        Some(m) if !m.is_empty() => Ok(m),
        _ => Err(ApiError::invalid("Messages array is required")),
    }
}

fn wire_messages(messages: &[Message]) -> impl Iterator<Item = Value> + '_ {
    messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
}

/// `POST /api/mistral/chat`.
pub(crate) async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiSuccess<ChatReply>>, ApiError> {
    let request: ChatBody = parse_body(&body)?;
    let messages = non_empty_messages(request.messages)?;
    let turn = request.turn.unwrap_or(1);

    if turn >= 8 {
        info!(turn, "turn limit exceeded, returning termination message");
        return Ok(Json(ApiSuccess::new(ChatReply {
            content: prompts::TERMINATION_MESSAGE.to_owned(),
        })));
    }

    let key = state.keys.mistral()?;
    let config = &state.config;
    let mut wire = vec![json!({
        "role": "system",
        "content": prompts::chat_system_prompt(turn),
    })];
    wire.extend(wire_messages(&messages));
    let payload = json!({
        "model": config.chat_model,
        "messages": wire,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "top_p": config.top_p,
    });

    let content = upstream::chat_completion(
        &state.http,
        &config.mistral_base_url,
        key,
        &payload,
        MISTRAL_CHAT,
    )
    .await
    .map_err(|e| {
        warn!(turn, error = %e, "chat completion failed");
        ApiError::upstream(e.to_string())
    })?;

    info!(turn, chars = content.chars().count(), "chat reply ready");
    Ok(Json(ApiSuccess::new(ChatReply { content })))
}

/// `data:` URIs pass through; bare base64 is assumed to be JPEG.
fn image_url(image: &str) -> String {
    if image.starts_with("data:") {
        image.to_owned()
    } else {
        format!("data:image/jpeg;base64,{image}")
    }
}

/// `POST /api/mistral/vision`.
pub(crate) async fn vision(State(state): State<AppState>, body: Bytes) -> Response {
    let request: VisionBody = match parse_body(&body) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let image = match request.image {
        Some(i) if !i.is_empty() => i,
        _ => return ApiError::invalid("Image (base64) is required").into_response(),
    };
    let messages = match non_empty_messages(request.messages) {
        Ok(m) => m,
        Err(e) => return e.into_response(),
    };
    let key = match state.keys.mistral() {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };

    match analyze(&state, key, &image, &messages).await {
        Ok(analysis) => {
            info!(turn = ?request.turn, themes = analysis.themes.len(), "vision analysis ready");
            Json(ApiSuccess::new(analysis)).into_response()
        }
        Err(e) => {
            warn!(
                turn = ?request.turn,
                error = %e,
                fallback = state.features.vision_fallback,
                "vision analysis failed"
            );
            if state.features.vision_fallback {
                let feedback = fallback::fallback_feedback(&messages);
                Json(ApiSuccess::new(json!({ "feedback": feedback }))).into_response()
            } else {
                let language = language::detect(&messages);
                ApiError::upstream(fallback::honest_error(language)).into_response()
            }
        }
    }
}

async fn analyze(
    state: &AppState,
    key: &str,
    image: &str,
    messages: &[Message],
) -> Result<VisionAnalysis, String> {
    let config = &state.config;
    let mut wire = vec![json!({
        "role": "system",
        "content": prompts::VISION_SYSTEM_PROMPT,
    })];
    wire.extend(wire_messages(messages));
    wire.push(json!({
        "role": "user",
        "content": [
            { "type": "text", "text": prompts::VISION_USER_INSTRUCTION },
            { "type": "image_url", "image_url": { "url": image_url(image) } },
        ],
    }));
    let payload = json!({
        "model": config.vision_model,
        "messages": wire,
        "response_format": { "type": "json_object" },
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "top_p": config.top_p,
    });

    let content = upstream::chat_completion(
        &state.http,
        &config.mistral_base_url,
        key,
        &payload,
        MISTRAL_VISION,
    )
    .await
    .map_err(|e| e.to_string())?;

    serde_json::from_str::<VisionAnalysis>(&content)
        .map_err(|e| format!("Failed to parse vision analysis result: {e}"))
}

/// `POST /api/elevenlabs/tts`. Streams the upstream audio back.
pub(crate) async fn tts(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: TtsBody = parse_body(&body)?;
    let text = match request.text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::invalid("Text is required")),
    };
    let key = state.keys.elevenlabs()?;
    let config = &state.config;

    let turn = request.turn.unwrap_or(1);
    let tone = tone_for_turn(turn);
    let stability = request.stability.unwrap_or(tone.stability);
    let style = request.style.unwrap_or(tone.style);
    let voice_id = request.voice_id.unwrap_or_else(|| config.voice_id.clone());
    let payload = json!({
        "text": text,
        "model_id": request.model.unwrap_or_else(|| config.tts_model.clone()),
        "voice_settings": {
            "stability": stability,
            "style": style,
            "use_speaker_boost": true,
        },
    });

    let upstream = upstream::text_to_speech(
        &state.http,
        &config.elevenlabs_base_url,
        key,
        &voice_id,
        &payload,
    )
    .await
    .map_err(|e| {
        warn!(turn, error = %e, "speech synthesis failed");
        ApiError::upstream(e.to_string())
    })?;

    info!(turn, stability, style, %voice_id, "streaming synthesized speech");
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("audio/mpeg")),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}

/// `GET /api/health`.
pub(crate) async fn health(State(state): State<AppState>) -> Json<ApiSuccess<Value>> {
    Json(ApiSuccess::new(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mistral": state.keys.has_mistral(),
        "elevenlabs": state.keys.has_elevenlabs(),
        "visionFallback": state.features.vision_fallback,
    })))
}

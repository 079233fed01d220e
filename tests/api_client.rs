//! Contract tests for the HTTP client against a mock API server.
//!
//! These verify request paths and bodies, envelope unwrapping, and how
//! error envelopes surface as `EchoError` variants.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use ink_echo::EchoError;
use ink_echo::api::{
    ApiClient, ChatRequest, ChatService, SPAN_API_REQUEST, SpeechSynthesizer, TtsRequest,
    VisionRequest, VisionService,
};
use ink_echo::conversation::Message;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn history() -> Vec<Message> {
    vec![
        Message::user("I keep rewriting the same paragraph"),
        Message::assistant("You are polishing instead of moving. What would done look like?"),
        Message::user("Maybe one page"),
    ]
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_sends_history_and_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mistral/chat"))
        .and(body_json(json!({
            "messages": [
                {"role": "user", "content": "I keep rewriting the same paragraph"},
                {"role": "assistant", "content": "You are polishing instead of moving. What would done look like?"},
                {"role": "user", "content": "Maybe one page"},
            ],
            "turn": 2,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"content": "One page is a promise. Will you write it by hand tonight?"},
            "success": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let reply = client
        .chat(&ChatRequest {
            messages: history(),
            turn: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(
        reply.content,
        "One page is a promise. Will you write it by hand tonight?"
    );
}

#[tokio::test]
async fn chat_error_envelope_becomes_chat_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mistral/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Mistral API error",
            "code": "API_ERROR",
            "success": false,
        })))
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let err = client
        .chat(&ChatRequest {
            messages: history(),
            turn: None,
        })
        .await
        .unwrap_err();
    match err {
        EchoError::Chat(msg) => assert_eq!(msg, "Mistral API error"),
        other => panic!("expected chat error, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_non_envelope_failure_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let err = client
        .chat(&ChatRequest {
            messages: history(),
            turn: Some(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EchoError::Chat(ref m) if m == "HTTP 502"), "{err:?}");
}

#[tokio::test]
async fn chat_unreachable_server_is_chat_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::with_base_url(format!("http://{addr}")).unwrap();
    let err = client
        .chat(&ChatRequest {
            messages: history(),
            turn: Some(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EchoError::Chat(_)));
}

// ---------------------------------------------------------------------------
// Vision
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vision_parses_full_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mistral/vision"))
        .and(body_partial_json(json!({"image": "data:image/jpeg;base64,AAAA"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "text": "one page, by hand",
                "themes": ["focus"],
                "keywords": ["page"],
                "main_idea": "Finish one page",
                "connections": ["rewriting"],
                "feedback": "You chose a page over perfection. What goes on it first?",
            },
            "success": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let analysis = client
        .analyze(&VisionRequest {
            image: "data:image/jpeg;base64,AAAA".into(),
            messages: history(),
            turn: Some(7),
        })
        .await
        .unwrap();
    assert_eq!(analysis.text, "one page, by hand");
    assert_eq!(analysis.themes, vec!["focus".to_owned()]);
    assert!(analysis.feedback.starts_with("You chose a page"));
}

#[tokio::test]
async fn vision_fallback_payload_only_has_feedback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mistral/vision"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"feedback": "I had trouble reading the handwriting, but the act of writing has value. What did you want to express?"},
            "success": true,
        })))
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let analysis = client
        .analyze(&VisionRequest {
            image: "AAAA".into(),
            messages: history(),
            turn: None,
        })
        .await
        .unwrap();
    assert!(analysis.text.is_empty());
    assert!(analysis.themes.is_empty());
    assert!(analysis.feedback.ends_with("express?"));
}

#[tokio::test]
async fn vision_failure_is_vision_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mistral/vision"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Sorry, I couldn't read the handwriting clearly.",
            "code": "API_ERROR",
            "success": false,
        })))
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let err = client
        .analyze(&VisionRequest {
            image: "AAAA".into(),
            messages: history(),
            turn: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EchoError::Vision(ref m) if m.starts_with("Sorry")));
}

// ---------------------------------------------------------------------------
// TTS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tts_returns_raw_audio_and_sends_tone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/elevenlabs/tts"))
        .and(body_partial_json(json!({
            "text": "Write it down now.",
            "turn": 7,
            "stability": 0.45,
            "style": 0.55,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let audio = client
        .synthesize(&TtsRequest {
            text: "Write it down now.".into(),
            turn: Some(7),
            voice_id: None,
            stability: Some(0.45),
            style: Some(0.55),
        })
        .await
        .unwrap();
    assert_eq!(audio.as_ref(), &[0xFF, 0xFB, 0x90, 0x00]);
}

#[tokio::test]
async fn tts_empty_payload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/elevenlabs/tts"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let err = client
        .synthesize(&TtsRequest {
            text: "hello".into(),
            turn: Some(1),
            voice_id: None,
            stability: None,
            style: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EchoError::Tts(_)));
}

#[tokio::test]
async fn tts_error_envelope_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/elevenlabs/tts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Text is required",
            "code": "INVALID_REQUEST",
            "success": false,
        })))
        .mount(&server)
        .await;

    let client = ApiClient::with_base_url(server.uri()).unwrap();
    let err = client
        .synthesize(&TtsRequest {
            text: " ".into(),
            turn: None,
            voice_id: None,
            stability: None,
            style: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EchoError::Tts(ref m) if m == "Text is required"));
}

// ---------------------------------------------------------------------------
// Request tracing
// ---------------------------------------------------------------------------

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[tokio::test]
async fn requests_are_traced_with_status_and_duration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mistral/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"content": "ok"},
            "success": true,
        })))
        .mount(&server)
        .await;

    let (logs, _guard) = capture();
    let client = ApiClient::with_base_url(server.uri()).unwrap();
    client
        .chat(&ChatRequest {
            messages: history(),
            turn: Some(1),
        })
        .await
        .unwrap();

    let text = logs.text();
    assert!(text.contains(SPAN_API_REQUEST), "{text}");
    assert!(text.contains("/api/mistral/chat"), "{text}");
    assert!(text.contains("request finished"), "{text}");
    assert!(text.contains("status=200"), "{text}");
    assert!(text.contains("duration_ms="), "{text}");
}

#[tokio::test]
async fn transport_failures_are_traced() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (logs, _guard) = capture();
    let client = ApiClient::with_base_url(format!("http://{addr}")).unwrap();
    let _ = client
        .synthesize(&TtsRequest {
            text: "hello".into(),
            turn: Some(1),
            voice_id: None,
            stability: None,
            style: None,
        })
        .await;

    let text = logs.text();
    assert!(text.contains("/api/elevenlabs/tts"), "{text}");
    assert!(text.contains("request failed"), "{text}");
    assert!(text.contains("duration_ms="), "{text}");
}

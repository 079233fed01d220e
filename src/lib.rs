//! Ink Echo: a voice-driven reflective journaling companion.
//!
//! The user speaks, the companion answers with one short reflection and
//! one question, and after a fixed number of turns asks for a photo of a
//! handwritten card. The photo's analysis resumes the conversation.
//!
//! # Architecture
//!
//! - **Recognition**: continuous speech recognition with silence-window
//!   utterance delivery and bounded network-error restarts
//! - **Conversation**: turn counting, session end, persistence
//! - **Playback**: tone-by-turn speech synthesis with exclusive audio output
//! - **Orchestrator**: routes utterances, replies, photos and notices
//! - **API client / server**: the chat, vision and TTS endpoints, and an
//!   axum server proxying them to Mistral and ElevenLabs

pub mod api;
pub mod config;
pub mod conversation;
pub mod dirs;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod photo;
pub mod playback;
pub mod recognition;
pub mod server;
pub mod store;

pub use config::EchoConfig;
pub use error::{EchoError, Result};
pub use orchestrator::{Orchestrator, UiEvent};

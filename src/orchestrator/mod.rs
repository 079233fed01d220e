//! Orchestration: recognition output to chat, chat output to history and
//! playback, photo upload to vision.
//!
//! The [`Orchestrator`] is the single owner of the conversation. It is
//! driven either directly (one `handle_*` call at a time) or by
//! [`Orchestrator::run`], which serializes recognition output and
//! [`Command`]s through one select loop.

pub mod notices;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use notices::{NoticeKind, notice_text};

use crate::api::{ChatRequest, ChatService, VisionRequest, VisionService};
use crate::config::FeatureFlags;
use crate::conversation::{ConversationManager, Role};
use crate::language::{self, Language};
use crate::photo;
use crate::playback::PlaybackController;
use crate::recognition::{RecognitionError, RecognitionOutput};

/// What a UI should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The live transcript changed.
    Transcript(String),
    /// A user message was appended.
    UserMessage(String),
    /// An assistant message was appended.
    AssistantMessage {
        /// Reply text.
        content: String,
        /// Turn number it was spoken at.
        turn: u32,
    },
    /// A notice to display (and usually speak).
    Notice {
        /// Why it is shown.
        kind: NoticeKind,
        /// Text in the conversation's language.
        text: String,
    },
    /// The turn limit was reached; show the upload affordance.
    SessionEnded {
        /// Turn count at the limit.
        turns: u32,
    },
    /// The session resumed after a photo analysis.
    SessionResumed,
    /// A brand new session started.
    SessionReset {
        /// New session id.
        id: String,
    },
    /// Recording stopped because of an error.
    RecordingStopped,
}

/// Requests that do not come from the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A photo was selected.
    Photo {
        /// Raw file bytes.
        bytes: Vec<u8>,
        /// MIME type of the file.
        mime: String,
    },
    /// Enter upload mode before the turn limit.
    StartUpload,
    /// Discard the session and start over.
    Reset,
}

/// Wires the capabilities together around one [`ConversationManager`].
pub struct Orchestrator {
    conversation: ConversationManager,
    chat: Arc<dyn ChatService>,
    vision: Arc<dyn VisionService>,
    playback: PlaybackController,
    features: FeatureFlags,
    events: mpsc::UnboundedSender<UiEvent>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("conversation", &self.conversation)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator. UI events are sent to `events`.
    pub fn new(
        conversation: ConversationManager,
        chat: Arc<dyn ChatService>,
        vision: Arc<dyn VisionService>,
        playback: PlaybackController,
        features: FeatureFlags,
        events: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            conversation,
            chat,
            vision,
            playback,
            features,
            events,
        }
    }

    /// The conversation being orchestrated.
    pub fn conversation(&self) -> &ConversationManager {
        &self.conversation
    }

    /// Current conversation language.
    pub fn language(&self) -> Language {
        language::detect(self.conversation.history())
    }

    /// Re-announce a restored session that is waiting for its photo.
    pub fn announce_restored_state(&self) {
        if self.conversation.is_session_ended() || self.conversation.is_waiting_vision() {
            self.emit(UiEvent::SessionEnded {
                turns: self.conversation.turns(),
            });
            self.show_notice(NoticeKind::UploadPrompt);
        }
    }

    /// A finalized utterance from the recognizer.
    pub async fn handle_utterance(&mut self, transcript: &str) {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return;
        }
        if self.conversation.is_session_ended() || self.conversation.is_waiting_vision() {
            debug!("ignoring utterance while a photo is expected");
            self.show_notice(NoticeKind::UploadPrompt);
            return;
        }

        self.conversation.add_message(Role::User, transcript);
        self.emit(UiEvent::UserMessage(transcript.to_owned()));

        let turn = self.conversation.next_turn();
        let request = ChatRequest {
            messages: self.conversation.history().to_vec(),
            turn: Some(turn),
        };

        match self.chat.chat(&request).await {
            Ok(reply) => {
                self.conversation
                    .add_message(Role::Assistant, reply.content.clone());
                let turn = self.conversation.turns();
                info!(
                    session_id = %self.conversation.id(),
                    turn,
                    "assistant replied"
                );
                self.emit(UiEvent::AssistantMessage {
                    content: reply.content.clone(),
                    turn,
                });
                self.speak(&reply.content, turn).await;

                if self.conversation.is_session_ended() {
                    self.emit(UiEvent::SessionEnded { turns: turn });
                    self.show_notice(NoticeKind::UploadPrompt);
                }
            }
            Err(e) => {
                warn!(error = %e, turn, "chat request failed");
                self.notify(NoticeKind::ChatRetry).await;
            }
        }
    }

    /// A fatal recognition error. Recording has already stopped.
    pub async fn handle_recognition_error(&mut self, error: &RecognitionError) {
        warn!(%error, "recognition stopped");
        self.emit(UiEvent::RecordingStopped);
        let kind = if error.is_permission() {
            NoticeKind::MicPermission
        } else {
            NoticeKind::RecognitionStopped
        };
        self.notify(kind).await;
    }

    /// A photo was selected.
    pub async fn handle_photo(&mut self, bytes: &[u8], mime: &str) {
        let image = match photo::prepare_photo(bytes, mime) {
            Ok(uri) => uri,
            Err(e) => {
                warn!(error = %e, "photo rejected");
                self.notify(NoticeKind::PhotoRejected).await;
                return;
            }
        };

        let request = VisionRequest {
            image,
            messages: self.conversation.history().to_vec(),
            turn: Some(self.conversation.turns()),
        };

        match self.vision.analyze(&request).await {
            Ok(analysis) => {
                self.conversation.resume_session_with_vision(&analysis);
                self.emit(UiEvent::SessionResumed);
                self.emit(UiEvent::AssistantMessage {
                    content: analysis.feedback.clone(),
                    turn: 1,
                });
                self.speak(&analysis.feedback, 1).await;
            }
            Err(e) if self.features.vision_fallback => {
                warn!(error = %e, "vision analysis failed with fallback enabled");
            }
            Err(e) => {
                warn!(error = %e, "vision analysis failed");
                self.conversation.start_upload_mode();
                self.notify(NoticeKind::VisionFailed).await;
            }
        }
    }

    /// Enter upload mode explicitly.
    pub fn start_upload_mode(&mut self) {
        self.conversation.start_upload_mode();
        self.emit(UiEvent::SessionEnded {
            turns: self.conversation.turns(),
        });
        self.show_notice(NoticeKind::UploadPrompt);
    }

    /// Discard the session and start a new one.
    pub fn reset_session(&mut self) {
        self.playback.cleanup();
        self.conversation.reset_session();
        self.emit(UiEvent::SessionReset {
            id: self.conversation.id().to_owned(),
        });
    }

    /// Apply one [`Command`].
    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Photo { bytes, mime } => self.handle_photo(&bytes, &mime).await,
            Command::StartUpload => self.start_upload_mode(),
            Command::Reset => self.reset_session(),
        }
    }

    /// Apply one recognition output.
    pub async fn handle_recognition(&mut self, output: RecognitionOutput) {
        match output {
            RecognitionOutput::Transcript(text) => self.emit(UiEvent::Transcript(text)),
            RecognitionOutput::Utterance(text) => self.handle_utterance(&text).await,
            RecognitionOutput::Error(error) => self.handle_recognition_error(&error).await,
        }
    }

    /// Drive the orchestrator until `cancel` fires or both inputs close.
    pub async fn run(
        mut self,
        mut recognition: mpsc::UnboundedReceiver<RecognitionOutput>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        let mut recognition_open = true;
        let mut commands_open = true;

        while recognition_open || commands_open {
            tokio::select! {
                () = cancel.cancelled() => break,
                output = recognition.recv(), if recognition_open => match output {
                    Some(output) => self.handle_recognition(output).await,
                    None => recognition_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => commands_open = false,
                },
            }
        }

        self.playback.cleanup();
        debug!("orchestrator stopped");
    }

    async fn speak(&self, text: &str, turn: u32) {
        if let Err(e) = self.playback.play_audio(text, turn).await {
            warn!(error = %e, turn, "playback failed");
        }
    }

    /// Show a notice and speak it.
    async fn notify(&self, kind: NoticeKind) {
        let text = self.show_notice(kind);
        self.speak(&text, self.conversation.turns()).await;
    }

    fn show_notice(&self, kind: NoticeKind) -> String {
        let text = notice_text(kind, self.language(), self.conversation.max_turns());
        self.emit(UiEvent::Notice {
            kind,
            text: text.clone(),
        });
        text
    }

    fn emit(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            debug!("UI event receiver dropped");
        }
    }
}

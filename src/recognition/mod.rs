//! Continuous speech recognition with silence-based finalization.
//!
//! A [`SpeechRecognizer`] produces a stream of [`RecognizerEvent`]s (interim
//! and final fragments, errors, stream end). The [`RecognitionController`]
//! turns that stream into discrete [`RecognitionOutput::Utterance`]s: final
//! fragments accumulate in a buffer and are delivered once no new fragment
//! has arrived for a full silence window.
//!
//! The controller is a plain state machine driven by explicit timestamps.
//! [`spawn_recognition`] runs it inside a tokio task that owns the timers,
//! which makes every transition that consumes the buffer also cancel the
//! deadlines referencing it.

pub mod actor;
pub mod controller;
pub mod error;
pub mod line;

pub use actor::{RecognitionHandle, spawn_recognition};
pub use controller::{RecognitionController, RecognitionSettings};
pub use error::RecognitionError;
pub use line::{LineFeed, LineRecognizer};

/// One hypothesis segment reported by a recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSegment {
    /// Recognized text.
    pub text: String,
    /// Whether the recognizer will no longer revise this segment.
    pub is_final: bool,
}

impl RecognitionSegment {
    /// A final segment.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// An interim (revisable) segment.
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Identifies one started stream. Every `start` call gets a fresh id, so
/// events still in flight from a stream that was stopped or replaced can be
/// told apart from events of the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl StreamId {
    /// The id following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// A [`RecognizerEvent`] tagged with the stream that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Stream the event came from.
    pub stream: StreamId,
    /// What happened.
    pub event: RecognizerEvent,
}

/// Event emitted by a running recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// New results since the previous event.
    Result(Vec<RecognitionSegment>),
    /// The stream reported an error.
    Error(RecognitionError),
    /// The stream ended on its own.
    End,
}

/// What the controller tells its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutput {
    /// The displayed transcript changed.
    Transcript(String),
    /// A completed utterance after a silence pause.
    Utterance(String),
    /// A fatal error. Recording has stopped.
    Error(RecognitionError),
}

/// A streaming speech-recognition capability.
///
/// Implementations deliver [`StreamEvent`]s through a channel handed to
/// them at construction, tagging each with the id passed to the `start`
/// call that opened the stream. `start` may be called again after the
/// stream ends.
pub trait SpeechRecognizer: Send {
    /// Begin (or restart) a continuous recognition stream as `stream`.
    ///
    /// # Errors
    ///
    /// Returns a [`RecognitionError`] if the stream cannot be started.
    fn start(&mut self, stream: StreamId) -> Result<(), RecognitionError>;

    /// Stop the stream. Events it still delivers are dropped by the
    /// controller because their id is no longer current.
    fn stop(&mut self);
}

//! Recognition error classification.

/// Errors reported by a speech recognition stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    /// Transport-level failure. Retried silently up to a bound.
    #[error("network error")]
    Network,

    /// The user or platform denied microphone access.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The recognition service refused the request.
    #[error("recognition service not allowed")]
    ServiceNotAllowed,

    /// The audio device could not be captured.
    #[error("audio capture failed")]
    AudioCapture,

    /// The stream was aborted by the platform.
    #[error("recognition aborted")]
    Aborted,

    /// The requested language is unsupported.
    #[error("language not supported: {0}")]
    LanguageNotSupported(String),

    /// The stream could not be started.
    #[error("failed to start recognition: {0}")]
    Start(String),

    /// Any other recognizer failure.
    #[error("{0}")]
    Other(String),

    /// Too many consecutive network errors.
    #[error("recognition failed after {0} consecutive network errors")]
    RetriesExhausted(u32),
}

impl RecognitionError {
    /// Whether the error is retried silently.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Whether the error means the microphone is not available to us.
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::ServiceNotAllowed)
    }
}

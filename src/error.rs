//! Error types for the ink-echo companion.

/// Top-level error type for the journaling companion.
#[derive(Debug, thiserror::Error)]
pub enum EchoError {
    /// Speech recognition failed in a way the caller must see.
    #[error("recognition error: {0}")]
    Recognition(#[from] crate::recognition::RecognitionError),

    /// Audio output could not be acquired or started.
    #[error("playback error: {0}")]
    Playback(String),

    /// Text-to-speech synthesis failed.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat endpoint failure.
    #[error("chat error: {0}")]
    Chat(String),

    /// Vision (handwritten note analysis) failure.
    #[error("vision error: {0}")]
    Vision(String),

    /// Photo could not be prepared for upload.
    #[error("photo error: {0}")]
    Photo(String),

    /// Session persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// API server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EchoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::RecognitionError;

    #[test]
    fn display_includes_category_prefix() {
        assert_eq!(
            EchoError::Chat("upstream 500".into()).to_string(),
            "chat error: upstream 500"
        );
        assert_eq!(
            EchoError::Tts("empty payload".into()).to_string(),
            "TTS error: empty payload"
        );
    }

    #[test]
    fn recognition_error_converts() {
        let err: EchoError = RecognitionError::PermissionDenied.into();
        assert!(matches!(
            err,
            EchoError::Recognition(RecognitionError::PermissionDenied)
        ));
        assert!(err.to_string().starts_with("recognition error:"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EchoError = io.into();
        assert!(matches!(err, EchoError::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EchoError>();
    }
}

//! Text-line recognizer for terminals.
//!
//! Each typed line becomes one final fragment; a blank line ends the
//! stream, which exercises the controller's restart path. Lines typed while
//! the recognizer is stopped are rejected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::{
    RecognitionError, RecognitionSegment, RecognizerEvent, SpeechRecognizer, StreamEvent, StreamId,
};

/// No stream is open.
const STOPPED: u64 = 0;

/// Recognizer half, owned by the recognition task.
#[derive(Debug)]
pub struct LineRecognizer {
    stream: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

/// Feeding half, owned by whoever reads input.
#[derive(Debug, Clone)]
pub struct LineFeed {
    stream: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl LineRecognizer {
    /// Create a recognizer, its feed, and the event receiver to hand to
    /// [`spawn_recognition`](super::spawn_recognition).
    pub fn channel() -> (Self, LineFeed, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Arc::new(AtomicU64::new(STOPPED));
        (
            Self {
                stream: Arc::clone(&stream),
                events: tx.clone(),
            },
            LineFeed { stream, events: tx },
            rx,
        )
    }
}

impl SpeechRecognizer for LineRecognizer {
    fn start(&mut self, stream: StreamId) -> Result<(), RecognitionError> {
        if self.events.is_closed() {
            return Err(RecognitionError::Start("event channel closed".into()));
        }
        if stream.0 == STOPPED {
            return Err(RecognitionError::Start("reserved stream id".into()));
        }
        self.stream.store(stream.0, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stream.store(STOPPED, Ordering::SeqCst);
    }
}

impl LineFeed {
    /// Whether the recognizer currently accepts input.
    pub fn is_listening(&self) -> bool {
        self.stream.load(Ordering::SeqCst) != STOPPED
    }

    /// Feed one line. Returns `false` if the recognizer is not listening.
    pub fn push_line(&self, line: &str) -> bool {
        let (stream, event) = if line.trim().is_empty() {
            (self.stream.swap(STOPPED, Ordering::SeqCst), RecognizerEvent::End)
        } else {
            (
                self.stream.load(Ordering::SeqCst),
                RecognizerEvent::Result(vec![RecognitionSegment::final_text(line)]),
            )
        };
        if stream == STOPPED {
            return false;
        }
        self.events
            .send(StreamEvent {
                stream: StreamId(stream),
                event,
            })
            .is_ok()
    }
}

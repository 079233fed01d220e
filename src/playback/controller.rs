//! Single-resource playback controller.
//!
//! At most one playback resource is alive at a time. Every new request
//! releases the previous resource before synthesizing, and every resource is
//! released on exactly one of: natural completion, the safety timeout, an
//! explicit [`PlaybackController::cleanup`], or being superseded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::tone::tone_for_turn;
use crate::api::{SpeechSynthesizer, TtsRequest};
use crate::error::Result;

/// An output device able to prepare synthesized audio for playback.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Decode `audio` and acquire a playback resource for it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Playback`] if the payload cannot be decoded
    /// or the device is unavailable.
    async fn load(&self, audio: Bytes) -> Result<Box<dyn PlaybackResource>>;
}

/// A loaded, playable piece of audio.
#[async_trait]
pub trait PlaybackResource: Send {
    /// Start playback. The returned receiver resolves when playback finishes
    /// on its own (or the sender is dropped).
    ///
    /// # Errors
    ///
    /// Returns [`crate::EchoError::Playback`] if playback cannot start.
    async fn play(&mut self) -> Result<oneshot::Receiver<()>>;

    /// Stop playback and free the underlying device resources. Idempotent.
    fn release(&mut self);
}

struct ActivePlayback {
    id: u64,
    resource: Box<dyn PlaybackResource>,
    watchdog: Option<JoinHandle<()>>,
}

impl ActivePlayback {
    fn release(mut self, reason: &str) {
        self.resource.release();
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        debug!(playback_id = self.id, reason, "playback released");
    }
}

type Slot = Arc<Mutex<Option<ActivePlayback>>>;

/// Synthesizes replies and plays them, one at a time.
pub struct PlaybackController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    safety_timeout: Duration,
    slot: Slot,
    next_id: AtomicU64,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("safety_timeout", &self.safety_timeout)
            .field("is_playing", &self.is_playing())
            .finish_non_exhaustive()
    }
}

impl PlaybackController {
    /// Create a controller. `safety_timeout` bounds how long a resource may
    /// stay alive without reporting completion.
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        safety_timeout: Duration,
    ) -> Self {
        Self {
            synthesizer,
            output,
            safety_timeout,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Whether a playback resource is currently alive.
    pub fn is_playing(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Synthesize `text` with the tone for `turn` and start playing it.
    /// Returns once playback has started.
    ///
    /// # Errors
    ///
    /// Propagates synthesis, decode and playback-start failures. Any
    /// partially acquired resource is released first.
    pub async fn play_audio(&self, text: &str, turn: u32) -> Result<()> {
        self.cleanup();

        let tone = tone_for_turn(turn);
        let request = TtsRequest {
            text: text.to_owned(),
            turn: Some(turn),
            voice_id: None,
            stability: Some(tone.stability),
            style: Some(tone.style),
        };
        let audio = self.synthesizer.synthesize(&request).await?;
        debug!(turn, bytes = audio.len(), "speech synthesized");

        let mut resource = self.output.load(audio).await?;
        let completion = match resource.play().await {
            Ok(completion) => completion,
            Err(e) => {
                resource.release();
                return Err(e);
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.take() {
            previous.release("superseded");
        }
        let watchdog = spawn_watchdog(Arc::clone(&self.slot), id, completion, self.safety_timeout);
        *slot = Some(ActivePlayback {
            id,
            resource,
            watchdog: Some(watchdog),
        });
        info!(playback_id = id, turn, "playback started");
        Ok(())
    }

    /// Stop and release the active resource, if any.
    pub fn cleanup(&self) {
        if let Some(active) = lock(&self.slot).take() {
            active.release("cleanup");
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<ActivePlayback>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_watchdog(
    slot: Slot,
    id: u64,
    completion: oneshot::Receiver<()>,
    safety_timeout: Duration,
) -> JoinHandle<()> {
    // Measured from acquisition, not from when the task first runs.
    let deadline = Instant::now() + safety_timeout;
    tokio::spawn(async move {
        let timed_out = tokio::select! {
            _ = completion => false,
            () = tokio::time::sleep_until(deadline) => true,
        };
        if timed_out {
            warn!(playback_id = id, "playback did not report completion in time");
        }
        let mut guard = lock(&slot);
        if guard.as_ref().is_some_and(|active| active.id == id) {
            if let Some(mut active) = guard.take() {
                // Never abort the task we are running in.
                active.watchdog = None;
                active.release(if timed_out { "safety timeout" } else { "completed" });
            }
        }
    })
}

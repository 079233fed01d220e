//! Recognition state machine.
//!
//! All state lives in one struct that every continuation reads fresh:
//! whether recording is active, the consecutive transient error count, the
//! final-fragment buffer, both timer deadlines and the id of the current
//! stream. Events tagged with any other stream id are stale and dropped.
//! Time is passed in explicitly so the machine can be driven
//! deterministically.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    RecognitionError, RecognitionOutput, RecognitionSegment, RecognizerEvent, SpeechRecognizer,
    StreamEvent, StreamId,
};
use crate::config::RecognitionConfig;
use crate::conversation::RecordingState;

/// Timing and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// Pause after the last final fragment before the buffer is delivered.
    pub silence_window: Duration,
    /// Delay before restarting the stream after a network error.
    pub retry_delay: Duration,
    /// Consecutive network errors tolerated before giving up.
    pub max_transient_errors: u32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self::from(&RecognitionConfig::default())
    }
}

impl From<&RecognitionConfig> for RecognitionSettings {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            silence_window: config.silence_window(),
            retry_delay: config.retry_delay(),
            max_transient_errors: config.max_transient_errors,
        }
    }
}

/// Turns a continuous recognizer stream into discrete utterances.
pub struct RecognitionController<R> {
    recognizer: R,
    settings: RecognitionSettings,
    active: bool,
    listening: bool,
    stream: StreamId,
    buffer: String,
    interim: String,
    transient_errors: u32,
    silence_deadline: Option<Instant>,
    retry_deadline: Option<Instant>,
    last_emitted: Option<(String, Instant)>,
}

impl<R: SpeechRecognizer> RecognitionController<R> {
    /// Create an idle controller.
    pub fn new(recognizer: R, settings: RecognitionSettings) -> Self {
        Self {
            recognizer,
            settings,
            active: false,
            listening: false,
            stream: StreamId::default(),
            buffer: String::new(),
            interim: String::new(),
            transient_errors: 0,
            silence_deadline: None,
            retry_deadline: None,
            last_emitted: None,
        }
    }

    /// Whether recording is logically on.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Id of the most recently started stream.
    pub fn current_stream(&self) -> StreamId {
        self.stream
    }

    /// Snapshot for display.
    pub fn recording_state(&self) -> RecordingState {
        RecordingState {
            is_recording: self.active,
            is_listening: self.listening,
            transcript: self.displayed_transcript(),
        }
    }

    /// Final buffer plus the current interim hypothesis.
    pub fn displayed_transcript(&self) -> String {
        match (self.buffer.is_empty(), self.interim.is_empty()) {
            (_, true) => self.buffer.clone(),
            (true, false) => self.interim.clone(),
            (false, false) => format!("{} {}", self.buffer, self.interim),
        }
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.silence_deadline, self.retry_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Begin recording. A no-op when already active.
    ///
    /// # Errors
    ///
    /// Returns the recognizer's error if the stream cannot be started; the
    /// controller stays idle.
    pub fn start(&mut self) -> Result<(), RecognitionError> {
        if self.active {
            debug!("recognition already active");
            return Ok(());
        }
        self.clear_pending();
        self.transient_errors = 0;
        self.open_stream()?;
        self.active = true;
        self.listening = true;
        info!("recognition started");
        Ok(())
    }

    /// Stop recording without delivering the buffer.
    ///
    /// Returns the transcript that was on display, for inspection only.
    pub fn stop(&mut self) -> String {
        let transcript = self.displayed_transcript();
        let was_active = self.active;
        self.clear_pending();
        self.active = false;
        self.listening = false;
        self.recognizer.stop();
        if was_active {
            info!("recognition stopped");
        }
        transcript
    }

    /// Apply a recognizer event.
    pub fn handle_event(&mut self, event: StreamEvent, now: Instant) -> Vec<RecognitionOutput> {
        if !self.active {
            debug!(?event, "ignoring recognizer event while idle");
            return Vec::new();
        }
        if event.stream != self.stream {
            debug!(
                stream = event.stream.0,
                current = self.stream.0,
                "ignoring event from a replaced stream"
            );
            return Vec::new();
        }
        match event.event {
            RecognizerEvent::Result(segments) => self.on_result(segments, now),
            RecognizerEvent::Error(error) => self.on_error(error, now),
            RecognizerEvent::End => self.on_end(now),
        }
    }

    /// Fire every deadline that is due at `now`.
    pub fn on_deadline(&mut self, now: Instant) -> Vec<RecognitionOutput> {
        let mut outputs = Vec::new();

        if self.retry_deadline.is_some_and(|d| d <= now) {
            self.retry_deadline = None;
            if self.active {
                outputs.extend(self.restart_stream(now));
            }
        }

        if self.silence_deadline.is_some_and(|d| d <= now) {
            self.silence_deadline = None;
            outputs.extend(self.flush(now));
        }

        outputs
    }

    fn on_result(&mut self, segments: Vec<RecognitionSegment>, now: Instant) -> Vec<RecognitionOutput> {
        let before = self.displayed_transcript();
        self.transient_errors = 0;
        self.listening = true;

        let mut interim = String::new();
        let mut got_final = false;
        for segment in segments {
            let text = normalize(&segment.text);
            if text.is_empty() {
                continue;
            }
            if segment.is_final {
                append_fragment(&mut self.buffer, &text);
                got_final = true;
            } else {
                append_fragment(&mut interim, &text);
            }
        }
        self.interim = interim;

        if got_final {
            self.silence_deadline = Some(now + self.settings.silence_window);
        }

        let after = self.displayed_transcript();
        if after == before {
            Vec::new()
        } else {
            vec![RecognitionOutput::Transcript(after)]
        }
    }

    fn on_error(&mut self, error: RecognitionError, now: Instant) -> Vec<RecognitionOutput> {
        if !error.is_transient() {
            warn!(%error, "fatal recognition error");
            return self.fail(error);
        }

        self.transient_errors += 1;
        if self.transient_errors > self.settings.max_transient_errors {
            warn!(
                attempts = self.transient_errors,
                "too many consecutive network errors"
            );
            return self.fail(RecognitionError::RetriesExhausted(
                self.settings.max_transient_errors,
            ));
        }

        warn!(
            attempt = self.transient_errors,
            max = self.settings.max_transient_errors,
            "transient recognition error, scheduling restart"
        );
        self.listening = false;
        self.retry_deadline = Some(now + self.settings.retry_delay);
        Vec::new()
    }

    fn on_end(&mut self, now: Instant) -> Vec<RecognitionOutput> {
        self.listening = false;
        if self.retry_deadline.is_some() {
            debug!("stream ended with a restart already scheduled");
            return Vec::new();
        }
        debug!("stream ended while active, restarting");
        self.restart_stream(now)
    }

    fn open_stream(&mut self) -> Result<(), RecognitionError> {
        self.stream = self.stream.next();
        self.recognizer.start(self.stream)
    }

    fn restart_stream(&mut self, now: Instant) -> Vec<RecognitionOutput> {
        match self.open_stream() {
            Ok(()) => {
                self.listening = true;
                Vec::new()
            }
            Err(error) => self.on_error(error, now),
        }
    }

    fn flush(&mut self, now: Instant) -> Vec<RecognitionOutput> {
        let text = self.buffer.trim().to_owned();
        let had_display = !self.displayed_transcript().is_empty();
        self.buffer.clear();
        self.interim.clear();

        let mut outputs = Vec::new();
        if had_display {
            outputs.push(RecognitionOutput::Transcript(String::new()));
        }
        if let Some(text) = self.deliver(text, now) {
            outputs.push(RecognitionOutput::Utterance(text));
        }
        outputs
    }

    /// Guard against delivering the same text twice within one window.
    fn deliver(&mut self, text: String, now: Instant) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        if let Some((last, at)) = &self.last_emitted {
            if *last == text && now.saturating_duration_since(*at) < self.settings.silence_window {
                debug!("dropping duplicate utterance");
                return None;
            }
        }
        self.last_emitted = Some((text.clone(), now));
        info!(chars = text.chars().count(), "utterance finalized");
        Some(text)
    }

    fn fail(&mut self, error: RecognitionError) -> Vec<RecognitionOutput> {
        self.clear_pending();
        self.active = false;
        self.listening = false;
        self.recognizer.stop();
        vec![RecognitionOutput::Error(error)]
    }

    fn clear_pending(&mut self) {
        self.buffer.clear();
        self.interim.clear();
        self.silence_deadline = None;
        self.retry_deadline = None;
    }
}

/// Collapse internal whitespace runs and trim.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn append_fragment(target: &mut String, fragment: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(fragment);
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Recognizer that counts calls and can be told to fail upcoming starts.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct ScriptedRecognizer {
        pub(crate) starts: Arc<AtomicU32>,
        pub(crate) stops: Arc<AtomicU32>,
        pub(crate) stream: Arc<AtomicU64>,
        pub(crate) start_failures: Arc<Mutex<VecDeque<RecognitionError>>>,
    }

    impl ScriptedRecognizer {
        pub(crate) fn starts(&self) -> u32 {
            self.starts.load(Ordering::SeqCst)
        }

        /// Tag `event` as coming from the most recently started stream.
        pub(crate) fn event(&self, event: RecognizerEvent) -> StreamEvent {
            StreamEvent {
                stream: StreamId(self.stream.load(Ordering::SeqCst)),
                event,
            }
        }

        pub(crate) fn fail_next_start(&self, error: RecognitionError) {
            if let Ok(mut q) = self.start_failures.lock() {
                q.push_back(error);
            }
        }
    }

    impl SpeechRecognizer for ScriptedRecognizer {
        fn start(&mut self, stream: StreamId) -> Result<(), RecognitionError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.stream.store(stream.0, Ordering::SeqCst);
            match self.start_failures.lock().ok().and_then(|mut q| q.pop_front()) {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settings() -> RecognitionSettings {
        RecognitionSettings {
            silence_window: Duration::from_secs(3),
            retry_delay: Duration::from_secs(1),
            max_transient_errors: 3,
        }
    }

    fn started() -> (ScriptedRecognizer, RecognitionController<ScriptedRecognizer>) {
        let rec = ScriptedRecognizer::default();
        let mut ctl = RecognitionController::new(rec.clone(), settings());
        assert!(ctl.start().is_ok());
        (rec, ctl)
    }

    /// Deliver `event` on the controller's current stream.
    fn feed(
        ctl: &mut RecognitionController<ScriptedRecognizer>,
        event: RecognizerEvent,
        now: Instant,
    ) -> Vec<RecognitionOutput> {
        let stream = ctl.current_stream();
        ctl.handle_event(StreamEvent { stream, event }, now)
    }

    fn finals(text: &str) -> RecognizerEvent {
        RecognizerEvent::Result(vec![RecognitionSegment::final_text(text)])
    }

    fn utterances(outputs: &[RecognitionOutput]) -> Vec<&str> {
        outputs
            .iter()
            .filter_map(|o| match o {
                RecognitionOutput::Utterance(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fragments_within_window_yield_one_trimmed_utterance() {
        let (_rec, mut ctl) = started();
        let t0 = Instant::now();

        feed(&mut ctl, finals("  hello   there "), t0);
        feed(&mut ctl, finals("world  "), t0 + Duration::from_secs(2));
        assert_eq!(ctl.next_deadline(), Some(t0 + Duration::from_secs(5)));

        // The first window was superseded by the second fragment.
        assert!(ctl.on_deadline(t0 + Duration::from_secs(3)).is_empty());

        let out = ctl.on_deadline(t0 + Duration::from_secs(5));
        assert_eq!(utterances(&out), vec!["hello there world"]);
        assert!(ctl.displayed_transcript().is_empty());
        assert!(ctl.is_active());

        assert!(ctl.on_deadline(t0 + Duration::from_secs(10)).is_empty());
        assert_eq!(ctl.next_deadline(), None);
    }

    #[test]
    fn interim_results_update_transcript_without_emitting() {
        let (_rec, mut ctl) = started();
        let t0 = Instant::now();

        let out = feed(
            &mut ctl,
            RecognizerEvent::Result(vec![RecognitionSegment::interim("hel")]),
            t0,
        );
        assert_eq!(out, vec![RecognitionOutput::Transcript("hel".into())]);
        assert_eq!(ctl.next_deadline(), None);

        feed(&mut ctl, finals("hello"), t0);
        feed(
            &mut ctl,
            RecognizerEvent::Result(vec![RecognitionSegment::interim("wor")]),
            t0,
        );
        assert_eq!(ctl.displayed_transcript(), "hello wor");
    }

    #[test]
    fn manual_stop_returns_transcript_and_never_emits() {
        let (rec, mut ctl) = started();
        let t0 = Instant::now();

        feed(&mut ctl, finals("keep this"), t0);
        feed(
            &mut ctl,
            RecognizerEvent::Result(vec![RecognitionSegment::interim("and that")]),
            t0,
        );
        assert_eq!(ctl.stop(), "keep this and that");
        assert!(!ctl.is_active());
        assert_eq!(ctl.next_deadline(), None);
        assert!(ctl.on_deadline(t0 + Duration::from_secs(60)).is_empty());
        assert_eq!(rec.stops.load(Ordering::SeqCst), 1);
        assert!(ctl.recording_state().transcript.is_empty());
    }

    #[test]
    fn unexpected_end_restarts_exactly_once() {
        let (rec, mut ctl) = started();
        let out = feed(&mut ctl, RecognizerEvent::End, Instant::now());
        assert!(out.is_empty());
        assert_eq!(rec.starts(), 2);
        assert!(ctl.recording_state().is_recording);
        assert!(ctl.recording_state().is_listening);
    }

    #[test]
    fn end_after_stop_does_not_restart() {
        let (rec, mut ctl) = started();
        ctl.stop();
        feed(&mut ctl, RecognizerEvent::End, Instant::now());
        assert_eq!(rec.starts(), 1);
    }

    #[test]
    fn end_with_pending_retry_waits_for_the_retry() {
        let (rec, mut ctl) = started();
        let t0 = Instant::now();
        feed(&mut ctl, RecognizerEvent::Error(RecognitionError::Network), t0);
        feed(&mut ctl, RecognizerEvent::End, t0);
        assert_eq!(rec.starts(), 1);

        ctl.on_deadline(t0 + Duration::from_secs(1));
        assert_eq!(rec.starts(), 2);
    }

    #[test]
    fn three_network_errors_tolerated_fourth_is_fatal() {
        let (rec, mut ctl) = started();
        let mut now = Instant::now();

        for attempt in 1..=3 {
            let out = feed(&mut ctl, RecognizerEvent::Error(RecognitionError::Network), now);
            assert!(out.is_empty(), "attempt {attempt} surfaced an error");
            assert!(ctl.recording_state().is_recording);
            now += Duration::from_secs(1);
            assert!(ctl.on_deadline(now).is_empty());
            assert_eq!(rec.starts(), 1 + attempt);
        }

        let out = feed(&mut ctl, RecognizerEvent::Error(RecognitionError::Network), now);
        assert_eq!(
            out,
            vec![RecognitionOutput::Error(RecognitionError::RetriesExhausted(3))]
        );
        assert!(!ctl.is_active());
        assert_eq!(ctl.next_deadline(), None);
    }

    #[test]
    fn successful_result_resets_error_count() {
        let (_rec, mut ctl) = started();
        let mut now = Instant::now();

        for _ in 0..3 {
            feed(&mut ctl, RecognizerEvent::Error(RecognitionError::Network), now);
            now += Duration::from_secs(1);
            ctl.on_deadline(now);
        }
        feed(
            &mut ctl,
            RecognizerEvent::Result(vec![RecognitionSegment::interim("ok")]),
            now,
        );
        for _ in 0..3 {
            let out = feed(&mut ctl, RecognizerEvent::Error(RecognitionError::Network), now);
            assert!(out.is_empty());
            now += Duration::from_secs(1);
            ctl.on_deadline(now);
        }
        assert!(ctl.is_active());
    }

    #[test]
    fn non_transient_error_surfaces_without_retry() {
        let (rec, mut ctl) = started();
        let t0 = Instant::now();
        feed(&mut ctl, finals("pending"), t0);

        let out = feed(
            &mut ctl,
            RecognizerEvent::Error(RecognitionError::PermissionDenied),
            t0,
        );
        assert_eq!(
            out,
            vec![RecognitionOutput::Error(RecognitionError::PermissionDenied)]
        );
        assert!(!ctl.is_active());
        assert_eq!(ctl.next_deadline(), None);
        assert!(ctl.on_deadline(t0 + Duration::from_secs(30)).is_empty());
        assert_eq!(rec.starts(), 1);
    }

    #[test]
    fn failed_restart_counts_as_an_error() {
        let (rec, mut ctl) = started();
        rec.fail_next_start(RecognitionError::AudioCapture);
        let out = feed(&mut ctl, RecognizerEvent::End, Instant::now());
        assert_eq!(
            out,
            vec![RecognitionOutput::Error(RecognitionError::AudioCapture)]
        );
        assert!(!ctl.is_active());
    }

    #[test]
    fn failed_start_stays_idle() {
        let rec = ScriptedRecognizer::default();
        rec.fail_next_start(RecognitionError::PermissionDenied);
        let mut ctl = RecognitionController::new(rec, settings());
        assert_eq!(ctl.start(), Err(RecognitionError::PermissionDenied));
        assert!(!ctl.is_active());
    }

    #[test]
    fn events_while_idle_are_ignored() {
        let rec = ScriptedRecognizer::default();
        let mut ctl = RecognitionController::new(rec, settings());
        assert!(feed(&mut ctl, finals("ghost"), Instant::now()).is_empty());
        assert_eq!(ctl.next_deadline(), None);
    }

    #[test]
    fn identical_text_within_one_window_is_delivered_once() {
        let (_rec, mut ctl) = started();
        let t0 = Instant::now();
        assert_eq!(ctl.deliver("same".into(), t0), Some("same".into()));
        assert_eq!(ctl.deliver("same".into(), t0 + Duration::from_secs(1)), None);
        // A genuine repeat arrives at least one window later.
        assert_eq!(
            ctl.deliver("same".into(), t0 + Duration::from_secs(4)),
            Some("same".into())
        );
    }

    #[test]
    fn late_end_from_stopped_stream_is_ignored_after_restart() {
        let (rec, mut ctl) = started();
        let old = ctl.current_stream();
        ctl.stop();
        assert!(ctl.start().is_ok());
        assert_eq!(rec.starts(), 2);

        let out = ctl.handle_event(
            StreamEvent {
                stream: old,
                event: RecognizerEvent::End,
            },
            Instant::now(),
        );
        assert!(out.is_empty());
        assert_eq!(rec.starts(), 2);
        assert!(ctl.recording_state().is_listening);
    }

    #[test]
    fn results_from_replaced_stream_are_not_buffered() {
        let (_rec, mut ctl) = started();
        let t0 = Instant::now();
        let first = ctl.current_stream();
        feed(&mut ctl, RecognizerEvent::End, t0);
        assert_ne!(ctl.current_stream(), first);

        let out = ctl.handle_event(
            StreamEvent {
                stream: first,
                event: finals("stale words"),
            },
            t0,
        );
        assert!(out.is_empty());
        assert!(ctl.displayed_transcript().is_empty());
        assert_eq!(ctl.next_deadline(), None);
    }

    #[test]
    fn restart_resets_buffer_and_counter() {
        let (_rec, mut ctl) = started();
        let t0 = Instant::now();
        feed(&mut ctl, finals("old"), t0);
        feed(&mut ctl, RecognizerEvent::Error(RecognitionError::Network), t0);
        ctl.stop();
        assert!(ctl.start().is_ok());
        assert!(ctl.displayed_transcript().is_empty());
        assert_eq!(ctl.transient_errors, 0);
    }
}

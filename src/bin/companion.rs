//! Console journaling companion.
//!
//! Typed lines stand in for recognized speech: each line is one final
//! fragment, and the utterance is delivered after the silence window.
//! Replies are spoken through the default output device.
//!
//! Commands: `/photo <path>`, `/upload`, `/reset`, `/start`, `/stop`, `/quit`.
//!
//! Logs go to a daily file under the data directory so that stdout stays
//! a clean conversation view.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ink_echo::api::ApiClient;
use ink_echo::config::PlaybackConfig;
use ink_echo::conversation::ConversationManager;
use ink_echo::orchestrator::Command;
use ink_echo::playback::{AudioOutput, PlaybackController};
use ink_echo::recognition::{LineRecognizer, RecognitionHandle, RecognitionSettings, spawn_recognition};
use ink_echo::store::{BackgroundStore, FsSessionStore};
use ink_echo::{EchoConfig, Orchestrator, UiEvent, dirs, photo};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let appender = tracing_appender::rolling::daily(dirs::logs_dir(), "ink-echo.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ink_echo=info")),
        )
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EchoConfig::load(config_path.as_deref())?;
    info!(max_turns = config.conversation.max_turns, "ink-echo starting");

    let store = FsSessionStore::new(dirs::sessions_dir())?;
    info!(dir = %store.dir().display(), "session store ready");
    let (store, session_writer) = BackgroundStore::spawn(Arc::new(store));
    let store = Arc::new(store);
    let conversation = ConversationManager::restore(store, &config.conversation);
    let client = Arc::new(ApiClient::new(&config.client)?);
    let playback = PlaybackController::new(
        client.clone(),
        audio_output(&config.playback),
        config.playback.safety_timeout(),
    );

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    println!("Ink Echo v{}", env!("CARGO_PKG_VERSION"));
    println!("Session {} (turn {})", conversation.id(), conversation.turns());
    let orchestrator = Orchestrator::new(
        conversation,
        client.clone(),
        client,
        playback,
        config.features.clone(),
        ui_tx,
    );
    orchestrator.announce_restored_state();

    let (recognizer, feed, recognizer_events) = LineRecognizer::channel();
    let (recognition, outputs) = spawn_recognition(
        recognizer,
        recognizer_events,
        RecognitionSettings::from(&config.recognition),
        cancel.clone(),
    );

    let printer = tokio::spawn(print_events(ui_rx));
    let driver = tokio::spawn(orchestrator.run(outputs, command_rx, cancel.clone()));

    if let Err(e) = recognition.start().await {
        println!("! could not start listening: {e}");
    }
    println!("Speak by typing. A blank line restarts listening. /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match parse_input(&line) {
            Input::Quit => break,
            Input::Start => {
                if let Err(e) = recognition.start().await {
                    println!("! could not start listening: {e}");
                }
            }
            Input::Stop => stop_listening(&recognition).await,
            Input::Upload => send(&command_tx, Command::StartUpload),
            Input::Reset => send(&command_tx, Command::Reset),
            Input::Photo(path) => match read_photo(&path) {
                Ok(command) => send(&command_tx, command),
                Err(e) => println!("! {e}"),
            },
            Input::Speech(text) => {
                if !feed.push_line(&text) {
                    println!("(not listening, type /start)");
                }
            }
        }
    }

    info!("ink-echo shutting down");
    cancel.cancel();
    drop(command_tx);
    let _ = driver.await;
    let _ = printer.await;
    // Every owner of the store is gone once the driver has finished.
    let _ = session_writer.await;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Start,
    Stop,
    Upload,
    Reset,
    Photo(PathBuf),
    Speech(String),
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "/quit" | "/exit" => Input::Quit,
        "/start" => Input::Start,
        "/stop" => Input::Stop,
        "/upload" => Input::Upload,
        "/reset" => Input::Reset,
        _ => match trimmed.strip_prefix("/photo ") {
            Some(path) => Input::Photo(PathBuf::from(path.trim())),
            None => Input::Speech(line.to_owned()),
        },
    }
}

fn read_photo(path: &Path) -> anyhow::Result<Command> {
    let mime = photo::mime_for_path(path)
        .ok_or_else(|| anyhow::anyhow!("unsupported photo type: {}", path.display()))?;
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    Ok(Command::Photo {
        bytes,
        mime: mime.to_owned(),
    })
}

async fn stop_listening(recognition: &RecognitionHandle) {
    match recognition.stop().await {
        Ok(pending) if !pending.is_empty() => println!("(stopped, discarded: {pending})"),
        Ok(_) => println!("(stopped)"),
        Err(e) => println!("! {e}"),
    }
}

fn send(commands: &mpsc::UnboundedSender<Command>, command: Command) {
    if commands.send(command).is_err() {
        println!("! the conversation has stopped");
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UiEvent::Transcript(text) if !text.is_empty() => println!("  … {text}"),
            UiEvent::Transcript(_) => {}
            UiEvent::UserMessage(text) => println!("you  > {text}"),
            UiEvent::AssistantMessage { content, turn } => println!("echo [{turn}] > {content}"),
            UiEvent::Notice { text, .. } => println!("* {text}"),
            UiEvent::SessionEnded { turns } => {
                println!("-- session ended after {turns} turns, send /photo <path> --");
            }
            UiEvent::SessionResumed => println!("-- session resumed --"),
            UiEvent::SessionReset { id } => println!("-- new session {id} --"),
            UiEvent::RecordingStopped => println!("-- listening stopped, type /start --"),
        }
    }
}

#[cfg(feature = "audio")]
fn audio_output(config: &PlaybackConfig) -> Arc<dyn AudioOutput> {
    use ink_echo::playback::CpalAudioOutput;
    match &config.output_device {
        Some(name) => Arc::new(CpalAudioOutput::with_device(name.clone())),
        None => Arc::new(CpalAudioOutput::new()),
    }
}

#[cfg(not(feature = "audio"))]
fn audio_output(_config: &PlaybackConfig) -> Arc<dyn AudioOutput> {
    Arc::new(silent::SilentOutput)
}

#[cfg(not(feature = "audio"))]
mod silent {
    use async_trait::async_trait;
    use bytes::Bytes;
    use ink_echo::Result;
    use ink_echo::playback::{AudioOutput, PlaybackResource};
    use tokio::sync::oneshot;

    /// Accepts every payload and finishes immediately.
    pub(super) struct SilentOutput;

    struct SilentPlayback;

    #[async_trait]
    impl AudioOutput for SilentOutput {
        async fn load(&self, _audio: Bytes) -> Result<Box<dyn PlaybackResource>> {
            Ok(Box::new(SilentPlayback))
        }
    }

    #[async_trait]
    impl PlaybackResource for SilentPlayback {
        async fn play(&mut self) -> Result<oneshot::Receiver<()>> {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(());
            Ok(rx)
        }

        fn release(&mut self) {}
    }
}

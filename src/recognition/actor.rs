//! Task that owns a [`RecognitionController`] and its timers.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    RecognitionController, RecognitionError, RecognitionOutput, RecognitionSettings,
    SpeechRecognizer, StreamEvent,
};
use crate::conversation::RecordingState;
use crate::error::{EchoError, Result};

enum Command {
    Start(oneshot::Sender<std::result::Result<(), RecognitionError>>),
    Stop(oneshot::Sender<String>),
}

/// Cloneable handle to a running recognition task.
#[derive(Debug, Clone)]
pub struct RecognitionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<RecordingState>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(_) => f.write_str("Start"),
            Self::Stop(_) => f.write_str("Stop"),
        }
    }
}

impl RecognitionHandle {
    /// Begin recording.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Recognition`] if the stream fails to start, or
    /// [`EchoError::Channel`] if the task has exited.
    pub async fn start(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(tx))?;
        let started = rx
            .await
            .map_err(|_| EchoError::Channel("recognition task dropped reply".into()))?;
        started.map_err(EchoError::from)
    }

    /// Stop recording without delivering the pending buffer. Returns the
    /// transcript that was on display.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Channel`] if the task has exited.
    pub async fn stop(&self) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(tx))?;
        rx.await
            .map_err(|_| EchoError::Channel("recognition task dropped reply".into()))
    }

    /// Latest recording state.
    pub fn state(&self) -> RecordingState {
        self.state.borrow().clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| EchoError::Channel("recognition task is not running".into()))
    }
}

/// Spawn the recognition task.
///
/// `events` is the receiving end of the channel the recognizer sends to.
/// Outputs are delivered on the returned receiver. The task exits when
/// `cancel` fires or every [`RecognitionHandle`] is dropped.
pub fn spawn_recognition<R>(
    recognizer: R,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    settings: RecognitionSettings,
    cancel: CancellationToken,
) -> (RecognitionHandle, mpsc::UnboundedReceiver<RecognitionOutput>)
where
    R: SpeechRecognizer + 'static,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(RecordingState::default());

    let controller = RecognitionController::new(recognizer, settings);
    tokio::spawn(run(controller, command_rx, events, output_tx, state_tx, cancel));

    (
        RecognitionHandle {
            commands: command_tx,
            state: state_rx,
        },
        output_rx,
    )
}

async fn run<R: SpeechRecognizer>(
    mut controller: RecognitionController<R>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    outputs: mpsc::UnboundedSender<RecognitionOutput>,
    state: watch::Sender<RecordingState>,
    cancel: CancellationToken,
) {
    let mut events_open = true;

    loop {
        let deadline = controller.next_deadline();
        let produced = tokio::select! {
            () = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(Command::Start(reply)) => {
                    let _ = reply.send(controller.start());
                    Vec::new()
                }
                Some(Command::Stop(reply)) => {
                    let _ = reply.send(controller.stop());
                    Vec::new()
                }
                None => break,
            },
            event = events.recv(), if events_open => match event {
                Some(event) => controller.handle_event(event, Instant::now()),
                None => {
                    debug!("recognizer event channel closed");
                    events_open = false;
                    Vec::new()
                }
            },
            () = sleep_until(deadline) => controller.on_deadline(Instant::now()),
        };

        state.send_replace(controller.recording_state());
        for output in produced {
            if outputs.send(output).is_err() {
                debug!("recognition output receiver dropped");
            }
        }
    }

    controller.stop();
    state.send_replace(controller.recording_state());
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

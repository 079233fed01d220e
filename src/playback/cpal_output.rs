//! Speaker output via cpal, with symphonia decoding.
//!
//! `cpal::Stream` is not `Send`, so each playback runs its stream on a
//! dedicated thread. The thread reports once the stream has started and
//! again when every sample has been played.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::oneshot;
use tracing::{error, info};

use super::controller::{AudioOutput, PlaybackResource};
use crate::error::{EchoError, Result};

/// Speaker output through the default or a named device.
#[derive(Debug, Clone, Default)]
pub struct CpalAudioOutput {
    device_name: Option<String>,
}

impl CpalAudioOutput {
    /// Play through the default output device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Play through the named output device.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

#[async_trait]
impl AudioOutput for CpalAudioOutput {
    async fn load(&self, audio: Bytes) -> Result<Box<dyn PlaybackResource>> {
        let decoded = tokio::task::spawn_blocking(move || decode_to_mono_f32(&audio))
            .await
            .map_err(|e| EchoError::Playback(format!("decode task failed: {e}")))??;
        Ok(Box::new(CpalPlayback {
            audio: Some(decoded),
            device_name: self.device_name.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }))
    }
}

struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
}

struct CpalPlayback {
    audio: Option<DecodedAudio>,
    device_name: Option<String>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[async_trait]
impl PlaybackResource for CpalPlayback {
    async fn play(&mut self) -> Result<oneshot::Receiver<()>> {
        let audio = self
            .audio
            .take()
            .ok_or_else(|| EchoError::Playback("audio already played".into()))?;
        let (started_tx, started_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let stop = Arc::clone(&self.stop);
        let device_name = self.device_name.clone();

        let handle = std::thread::Builder::new()
            .name("ink-echo-playback".into())
            .spawn(move || {
                run_stream(audio, device_name.as_deref(), &stop, started_tx, done_tx);
            })
            .map_err(|e| EchoError::Playback(format!("failed to spawn playback thread: {e}")))?;
        self.thread = Some(handle);

        started_rx
            .await
            .map_err(|_| EchoError::Playback("playback thread exited early".into()))??;
        Ok(done_rx)
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.audio = None;
        // The thread notices the flag within one poll interval.
        self.thread.take();
    }
}

fn open_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| EchoError::Playback(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| EchoError::Playback(format!("output device '{name}' not found"))),
        None => host
            .default_output_device()
            .ok_or_else(|| EchoError::Playback("no default output device".into())),
    }
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

fn run_stream(
    audio: DecodedAudio,
    device_name: Option<&str>,
    stop: &AtomicBool,
    started: oneshot::Sender<Result<()>>,
    done: oneshot::Sender<()>,
) {
    let device = match open_device(device_name) {
        Ok(d) => d,
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: audio.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: audio.samples,
        position: 0,
        finished: false,
    }));
    let callback_buffer = Arc::clone(&buffer);

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            let Ok(mut buf) = callback_buffer.lock() else {
                return;
            };
            for sample in data.iter_mut() {
                if buf.position < buf.samples.len() {
                    *sample = buf.samples[buf.position];
                    buf.position += 1;
                } else {
                    *sample = 0.0;
                    buf.finished = true;
                }
            }
        },
        move |err| {
            error!("audio output stream error: {err}");
        },
        None,
    );
    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = started.send(Err(EchoError::Playback(format!(
                "failed to build output stream: {e}"
            ))));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = started.send(Err(EchoError::Playback(format!(
            "failed to start output stream: {e}"
        ))));
        return;
    }
    let _ = started.send(Ok(()));
    info!(sample_rate = audio.sample_rate, "speaker playback started");

    loop {
        std::thread::sleep(Duration::from_millis(10));
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let finished = buffer.lock().map(|b| b.finished).unwrap_or(true);
        if finished {
            break;
        }
    }

    drop(stream);
    let _ = done.send(());
}

fn decode_to_mono_f32(bytes: &[u8]) -> Result<DecodedAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| EchoError::Playback(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| EchoError::Playback("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| EchoError::Playback("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| EchoError::Playback(format!("failed to create decoder: {e}")))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(EchoError::Playback(format!("audio read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(EchoError::Playback(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let frames = decoded.frames() as u64;
        let required = usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(channels);

        match sample_buf.as_mut() {
            Some(b) if b.capacity() >= required => b.clear(),
            _ => sample_buf = Some(SampleBuffer::<f32>::new(frames, spec)),
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        if channels == 1 {
            samples.extend_from_slice(buf.samples());
        } else {
            for frame in buf.samples().chunks_exact(channels) {
                samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }
    }

    if samples.is_empty() {
        return Err(EchoError::Playback("audio payload contained no samples".into()));
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

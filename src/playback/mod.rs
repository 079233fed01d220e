//! Speech playback: tone derivation, the single-resource playback
//! controller, and the cpal-backed output device.

pub mod controller;
#[cfg(feature = "audio")]
pub mod cpal_output;
pub mod tone;

pub use controller::{AudioOutput, PlaybackController, PlaybackResource};
#[cfg(feature = "audio")]
pub use cpal_output::CpalAudioOutput;
pub use tone::{ToneParams, tone_for_turn};

//! Turn-dependent voice tone.
//!
//! Later turns get a less stable, more stylized voice:
//!
//! | turn       | stability | style |
//! |------------|-----------|-------|
//! | 0 to 4     | 0.70      | 0.30  |
//! | 5 and 6    | 0.55      | 0.45  |
//! | 7 and up   | 0.45      | 0.55  |

use serde::{Deserialize, Serialize};

/// Voice settings sent to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParams {
    /// Voice stability, 0.0 to 1.0.
    pub stability: f32,
    /// Style exaggeration, 0.0 to 1.0.
    pub style: f32,
}

/// Tone for the given turn number.
pub fn tone_for_turn(turn: u32) -> ToneParams {
    match turn {
        7.. => ToneParams {
            stability: 0.45,
            style: 0.55,
        },
        5..=6 => ToneParams {
            stability: 0.55,
            style: 0.45,
        },
        _ => ToneParams {
            stability: 0.7,
            style: 0.3,
        },
    }
}

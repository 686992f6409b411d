/// Playback parameters and volume ramps
///
/// `PlaybackParams` is the per-sound configuration handed to every voice the
/// sound spawns; `Fade` is the linear ramp shared by layers and groups.

pub mod fade;

pub use fade::{Fade, FadeStep};

use crate::utils::{clamp_pitch, clamp_volume};

/// Volume, pitch and loop settings applied to a voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    /// Gain multiplier (0.0-1.0)
    pub volume: f32,

    /// Playback-rate multiplier (0.1-10.0)
    pub pitch: f32,

    pub looping: bool,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            looping: false,
        }
    }
}

impl PlaybackParams {
    /// Set volume
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = clamp_volume(volume);
        self
    }

    /// Set pitch
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = clamp_pitch(pitch);
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

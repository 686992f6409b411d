//! Seam between the resource layer and whatever produces sound.
//!
//! The manager owns exactly one [`AudioEngine`] between `initialize` and
//! `shutdown`. Sounds own the [`Voice`]s it creates and groups own the
//! [`Bus`]es; everything created by an engine must be dropped before it.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::effects::PlaybackParams;
use super::source::LoadMode;
use crate::decoder;
use crate::error::AudioResult;
use crate::spatial::{Listener, SpatialParams};
use crate::utils::clamp_volume;

/// Everything needed to create one playing instance of a file
#[derive(Clone)]
pub struct VoiceRequest<'a> {
    pub path: &'a Path,
    pub mode: LoadMode,
    pub params: PlaybackParams,
    /// `None` disables positioning for this voice
    pub spatial: Option<SpatialParams>,
    /// Group bus this voice mixes into
    pub bus: Option<Arc<dyn Bus>>,
}

pub trait AudioEngine: Send {
    /// Create a stopped voice; `Voice::start` begins playback.
    fn create_voice(&mut self, request: VoiceRequest<'_>) -> AudioResult<Box<dyn Voice>>;

    fn create_bus(&mut self) -> AudioResult<Arc<dyn Bus>>;

    fn set_master_volume(&mut self, volume: f32);

    fn master_volume(&self) -> f32;

    fn set_listener(&mut self, listener: Listener);

    fn listener(&self) -> Listener;

    /// File length read from its header
    fn probe_duration(&self, path: &Path) -> AudioResult<Duration> {
        decoder::probe_duration(path)
    }
}

/// One playing instance of a sound
pub trait Voice: Send {
    fn start(&mut self);

    fn stop(&mut self);

    /// False once stopped or once a non-looping voice reaches its end
    fn is_playing(&self) -> bool;

    fn set_volume(&mut self, volume: f32);

    fn set_pitch(&mut self, pitch: f32);

    fn set_looping(&mut self, looping: bool);

    fn set_spatial(&mut self, spatial: Option<SpatialParams>);
}

/// A mixing bus whose gain scales every voice routed into it
pub trait Bus: Send + Sync {
    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;
}

/// Lock-free gain cell, read from the audio thread and written from control
/// threads
#[derive(Debug)]
pub struct SharedGain(AtomicU32);

impl SharedGain {
    pub fn new(gain: f32) -> Self {
        Self(AtomicU32::new(clamp_volume(gain).to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(clamp_volume(gain).to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Bus for SharedGain {
    fn set_volume(&self, volume: f32) {
        self.set(volume);
    }

    fn volume(&self) -> f32 {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_gain_clamps() {
        let gain = SharedGain::new(2.0);
        assert_eq!(gain.get(), 1.0);
        gain.set(0.25);
        assert_eq!(gain.get(), 0.25);
        gain.set(-1.0);
        assert_eq!(gain.get(), 0.0);
    }

    #[test]
    fn test_shared_gain_as_bus() {
        let bus: Arc<dyn Bus> = Arc::new(SharedGain::default());
        assert_eq!(bus.volume(), 1.0);
        bus.set_volume(0.4);
        assert_eq!(bus.volume(), 0.4);
    }
}

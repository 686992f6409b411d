//! Randomized sound container: plays one of several interchangeable sounds,
//! optionally avoiding immediate repeats and varying pitch.

use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::manager::AudioManager;
use crate::error::{AudioError, AudioResult};
use crate::handle::{GroupHandle, SoundHandle};
use crate::utils::{clamp_volume, scan_audio_files};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomContainerConfig {
    /// Never pick the previous sound twice in a row (when there is a choice)
    pub avoid_repeat: bool,
    pub pitch_min: f32,
    pub pitch_max: f32,
    /// Group new sounds are routed through
    pub group: Option<GroupHandle>,
    /// Files longer than this are skipped when loading a folder
    pub max_duration: Option<Duration>,
}

impl Default for RandomContainerConfig {
    fn default() -> Self {
        Self {
            avoid_repeat: true,
            pitch_min: 1.0,
            pitch_max: 1.0,
            group: None,
            max_duration: None,
        }
    }
}

pub struct RandomSoundContainer {
    name: String,
    audio: AudioManager,
    config: RandomContainerConfig,
    sounds: Vec<SoundHandle>,
    last_played: Option<SoundHandle>,
    rng: StdRng,
}

impl RandomSoundContainer {
    pub fn new(audio: &AudioManager, name: impl Into<String>, config: RandomContainerConfig) -> Self {
        Self::with_rng(audio, name, config, StdRng::from_entropy())
    }

    /// Deterministic selection, for tests and replays
    pub fn with_seed(
        audio: &AudioManager,
        name: impl Into<String>,
        config: RandomContainerConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(audio, name, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        audio: &AudioManager,
        name: impl Into<String>,
        config: RandomContainerConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            name: name.into(),
            audio: audio.clone(),
            config,
            sounds: Vec::new(),
            last_played: None,
            rng,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RandomContainerConfig {
        &self.config
    }

    pub fn sounds(&self) -> &[SoundHandle] {
        &self.sounds
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn last_played(&self) -> Option<SoundHandle> {
        self.last_played
    }

    /// Load one file into the container
    pub fn add_sound(&mut self, path: impl AsRef<Path>) -> AudioResult<SoundHandle> {
        let handle = self.audio.load_sound(path, self.config.group)?;
        self.sounds.push(handle);
        Ok(handle)
    }

    /// Load every matching file in `folder`, skipping files over the
    /// configured maximum duration. Returns how many sounds were added.
    pub fn load_from_folder(&mut self, folder: impl AsRef<Path>) -> AudioResult<usize> {
        let folder = folder.as_ref();
        let extension = self.audio.config().extension().to_string();
        let files = scan_audio_files(folder, &extension)
            .map_err(|e| AudioError::file_load(folder, e))?;

        let mut added = 0;
        for file in files {
            if let Some(limit) = self.config.max_duration {
                match self.audio.probe_duration(&file) {
                    Ok(length) if length > limit => {
                        tracing::debug!(
                            "[{}] Skipping {} ({:.2}s > {:.2}s)",
                            self.name,
                            file.display(),
                            length.as_secs_f32(),
                            limit.as_secs_f32()
                        );
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(
                        "[{}] Could not probe {}, keeping it: {}",
                        self.name,
                        file.display(),
                        e
                    ),
                }
            }

            match self.add_sound(&file) {
                Ok(_) => added += 1,
                Err(e) => tracing::warn!("[{}] Failed to load {}: {}", self.name, file.display(), e),
            }
        }

        tracing::info!(
            "[{}] Loaded {} sounds from {}",
            self.name,
            added,
            folder.display()
        );
        Ok(added)
    }

    /// Pick the next sound, honoring repeat avoidance. Only a successful
    /// play records the pick as last played.
    pub fn select_random_sound(&mut self) -> Option<SoundHandle> {
        match (self.sounds.len(), self.last_played) {
            (0, _) => None,
            (1, _) => Some(self.sounds[0]),
            (_, Some(last)) if self.config.avoid_repeat => {
                let candidates: Vec<SoundHandle> =
                    self.sounds.iter().copied().filter(|s| *s != last).collect();
                if candidates.is_empty() {
                    return Some(last);
                }
                Some(candidates[self.rng.gen_range(0..candidates.len())])
            }
            (len, _) => Some(self.sounds[self.rng.gen_range(0..len)]),
        }
    }

    /// Uniform pick that ignores and does not update repeat history
    pub fn random_sound(&mut self) -> Option<SoundHandle> {
        if self.sounds.is_empty() {
            return None;
        }
        Some(self.sounds[self.rng.gen_range(0..self.sounds.len())])
    }

    pub fn play(&mut self) -> AudioResult<Option<SoundHandle>> {
        self.play_with_volume(1.0)
    }

    /// Play a randomly selected sound at `volume`, applying a random pitch
    /// when a pitch range is configured
    pub fn play_with_volume(&mut self, volume: f32) -> AudioResult<Option<SoundHandle>> {
        let Some(sound) = self.select_random_sound() else {
            tracing::warn!("[{}] No sounds to play", self.name);
            return Ok(None);
        };

        self.audio.set_sound_volume(sound, clamp_volume(volume))?;

        let (low, high) = self.pitch_bounds();
        if low != 1.0 || high != 1.0 {
            let pitch = if low < high {
                self.rng.gen_range(low..=high)
            } else {
                low
            };
            self.audio.set_sound_pitch(sound, pitch)?;
        }

        self.audio.play_sound(sound)?;
        self.last_played = Some(sound);
        Ok(Some(sound))
    }

    fn pitch_bounds(&self) -> (f32, f32) {
        let (a, b) = (self.config.pitch_min, self.config.pitch_max);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn stop_all(&self) -> AudioResult<()> {
        for sound in &self.sounds {
            self.audio.stop_sound(*sound)?;
        }
        Ok(())
    }

    pub fn set_pitch_range(&mut self, min: f32, max: f32) {
        self.config.pitch_min = min;
        self.config.pitch_max = max;
    }

    pub fn set_avoid_repeat(&mut self, avoid: bool) {
        self.config.avoid_repeat = avoid;
    }

    /// Unload every sound this container owns
    pub fn clear(&mut self) -> AudioResult<()> {
        for sound in self.sounds.drain(..) {
            self.audio.unload_sound(sound)?;
        }
        self.last_played = None;
        Ok(())
    }
}

impl Drop for RandomSoundContainer {
    fn drop(&mut self) {
        if !self.audio.is_initialized() {
            return;
        }
        if let Err(e) = self.clear() {
            tracing::warn!("[{}] Failed to unload sounds: {}", self.name, e);
        }
    }
}

//! Layered track: looping sounds that start and stop together, each with its
//! own volume envelope.

use std::time::{Duration, Instant};

use super::effects::{Fade, FadeStep};
use super::engine::AudioEngine;
use super::sound::Sound;
use crate::error::AudioResult;
use crate::utils::clamp_volume;

struct Layer {
    name: String,
    sound: Sound,
    volume: f32,
    fade: Option<Fade>,
}

impl Layer {
    fn apply_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        self.sound.set_volume(self.volume);
    }
}

#[derive(Default)]
pub(crate) struct AudioTrack {
    layers: Vec<Layer>,
    playing: bool,
}

impl AudioTrack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.name == name)
    }

    fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Add a silent looping layer. A layer with the same name is replaced in
    /// place. When the track is already playing the new layer joins at once.
    pub(crate) fn add_layer(
        &mut self,
        engine: &mut dyn AudioEngine,
        name: &str,
        mut sound: Sound,
    ) -> AudioResult<()> {
        sound.set_looping(true);
        sound.set_volume(0.0);
        if self.playing {
            sound.play(engine, None)?;
        }

        let layer = Layer {
            name: name.to_string(),
            sound,
            volume: 0.0,
            fade: None,
        };

        match self.layer_mut(name) {
            Some(existing) => {
                existing.sound.stop();
                *existing = layer;
            }
            None => self.layers.push(layer),
        }
        Ok(())
    }

    /// Stop and drop a layer; unknown names are ignored
    pub(crate) fn remove_layer(&mut self, name: &str) {
        if let Some(index) = self.layers.iter().position(|layer| layer.name == name) {
            let mut layer = self.layers.remove(index);
            layer.sound.stop();
        }
    }

    /// Start every layer; no-op while already playing. If any layer fails
    /// to start, the layers already started are stopped again.
    pub(crate) fn play(&mut self, engine: &mut dyn AudioEngine) -> AudioResult<()> {
        if self.playing {
            return Ok(());
        }
        for index in 0..self.layers.len() {
            if let Err(e) = self.layers[index].sound.play(engine, None) {
                for layer in &mut self.layers[..index] {
                    layer.sound.stop();
                }
                tracing::warn!(
                    "Layer '{}' failed to start, track stopped: {}",
                    self.layers[index].name,
                    e
                );
                return Err(e);
            }
        }
        self.playing = true;
        Ok(())
    }

    pub(crate) fn stop(&mut self) {
        for layer in &mut self.layers {
            layer.sound.stop();
        }
        self.playing = false;
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing
    }

    /// Ramp a layer from its current volume; unknown names are ignored
    pub(crate) fn fade_layer(&mut self, name: &str, target: f32, duration: Duration, now: Instant) {
        if let Some(layer) = self.layer_mut(name) {
            layer.fade = Some(Fade::new(layer.volume, target, duration, now));
        }
    }

    /// Jump a layer to `volume`, cancelling its fade; unknown names are ignored
    pub(crate) fn set_layer_volume(&mut self, name: &str, volume: f32) {
        if let Some(layer) = self.layer_mut(name) {
            layer.fade = None;
            layer.apply_volume(volume);
        }
    }

    pub(crate) fn layer_volume(&self, name: &str) -> Option<f32> {
        self.layer(name).map(|layer| layer.volume)
    }

    pub(crate) fn is_layer_fading(&self, name: &str) -> Option<bool> {
        self.layer(name).map(|layer| layer.fade.is_some())
    }

    pub(crate) fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.name.clone()).collect()
    }

    #[cfg(test)]
    pub(crate) fn has_layer(&self, name: &str) -> bool {
        self.layer(name).is_some()
    }

    /// Advance every layer's fade to `now`
    pub(crate) fn update(&mut self, now: Instant) {
        for layer in &mut self.layers {
            let Some(fade) = layer.fade else {
                continue;
            };
            match fade.step(now) {
                FadeStep::Running(volume) => layer.apply_volume(volume),
                FadeStep::Finished(volume) => {
                    layer.apply_volume(volume);
                    layer.fade = None;
                }
            }
        }
    }
}

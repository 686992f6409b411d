//! Named sound effect collections routed through one SFX group.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::manager::AudioManager;
use super::random_container::{RandomContainerConfig, RandomSoundContainer};
use crate::config::SfxCollectionConfig;
use crate::error::{AudioError, AudioResult};
use crate::handle::{GroupHandle, SoundHandle};

pub struct SfxPlayer {
    audio: AudioManager,
    group: Option<GroupHandle>,
    containers: HashMap<String, RandomSoundContainer>,
}

impl SfxPlayer {
    pub fn new(audio: &AudioManager, group: Option<GroupHandle>) -> Self {
        Self {
            audio: audio.clone(),
            group,
            containers: HashMap::new(),
        }
    }

    /// Build a player with one collection per config entry. Collections whose
    /// folder cannot be read are logged and skipped.
    pub fn from_config(
        audio: &AudioManager,
        group: Option<GroupHandle>,
        collections: &[SfxCollectionConfig],
    ) -> Self {
        let mut player = Self::new(audio, group);
        for collection in collections {
            let config = RandomContainerConfig {
                avoid_repeat: collection.avoid_repeat,
                pitch_min: collection.pitch_min,
                pitch_max: collection.pitch_max,
                group,
                max_duration: (collection.max_duration_secs > 0.0)
                    .then(|| Duration::from_secs_f32(collection.max_duration_secs)),
            };
            if let Err(e) = player.load_collection(&collection.name, &collection.folder, config) {
                tracing::warn!("Failed to load SFX collection '{}': {}", collection.name, e);
            }
        }
        player
    }

    pub fn group(&self) -> Option<GroupHandle> {
        self.group
    }

    /// Load `folder` into a collection called `name`, replacing any existing
    /// collection of that name. The player's group overrides `config.group`.
    pub fn load_collection(
        &mut self,
        name: &str,
        folder: impl AsRef<Path>,
        config: RandomContainerConfig,
    ) -> AudioResult<usize> {
        let config = RandomContainerConfig {
            group: self.group,
            ..config
        };
        let mut container = RandomSoundContainer::new(&self.audio, name, config);
        let loaded = container.load_from_folder(folder)?;
        self.containers.insert(name.to_string(), container);
        Ok(loaded)
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    pub fn collection(&self, name: &str) -> Option<&RandomSoundContainer> {
        self.containers.get(name)
    }

    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.containers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn play(&mut self, name: &str) -> AudioResult<Option<SoundHandle>> {
        self.play_with_volume(name, 1.0)
    }

    pub fn play_with_volume(&mut self, name: &str, volume: f32) -> AudioResult<Option<SoundHandle>> {
        let container = self
            .containers
            .get_mut(name)
            .ok_or_else(|| AudioError::validation(format!("Sound effect '{}' not found", name)))?;
        container.play_with_volume(volume)
    }

    pub fn stop_all(&self) -> AudioResult<()> {
        for container in self.containers.values() {
            container.stop_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    fn write_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn manager() -> AudioManager {
        let manager = AudioManager::headless(AudioConfig::default());
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn test_collections_use_player_group() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"));
        write_wav(&dir.path().join("b.wav"));

        let manager = manager();
        let sfx = manager.create_group("sfx").unwrap();
        let mut player = SfxPlayer::new(&manager, Some(sfx));
        let loaded = player
            .load_collection("touch", dir.path(), RandomContainerConfig::default())
            .unwrap();
        assert_eq!(loaded, 2);

        let sound = player.play("touch").unwrap().unwrap();
        assert_eq!(manager.sound_group(sound).unwrap(), Some(sfx));
        assert!(manager.is_sound_playing(sound).unwrap());
    }

    #[test]
    fn test_unknown_collection_is_an_error() {
        let manager = manager();
        let mut player = SfxPlayer::new(&manager, None);
        let err = player.play("nothing").unwrap_err();
        assert!(matches!(err, AudioError::Validation(_)));
    }

    #[test]
    fn test_from_config_skips_missing_folders() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("whoosh.wav"));

        let manager = manager();
        let collections = vec![
            SfxCollectionConfig {
                name: "woosh".to_string(),
                folder: dir.path().display().to_string(),
                avoid_repeat: true,
                pitch_min: 0.9,
                pitch_max: 1.1,
                max_duration_secs: 0.0,
            },
            SfxCollectionConfig {
                name: "ghost".to_string(),
                folder: dir.path().join("absent").display().to_string(),
                avoid_repeat: true,
                pitch_min: 1.0,
                pitch_max: 1.0,
                max_duration_secs: 0.0,
            },
        ];
        let player = SfxPlayer::from_config(&manager, None, &collections);
        assert_eq!(player.collection_names(), vec!["woosh"]);
        assert_eq!(player.collection("woosh").unwrap().config().pitch_min, 0.9);
    }
}

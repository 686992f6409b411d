use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio_system::source::StreamingPolicy;
use crate::error::ConfigError;
use crate::logging::LogLevel;

/// Default spatial parameters applied to newly loaded sounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialDefaults {
    pub min_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
    /// Whether new sounds are positioned relative to the listener
    pub spatialization: bool,
}

impl Default for SpatialDefaults {
    fn default() -> Self {
        Self {
            min_distance: 1.0,
            max_distance: f32::MAX,
            rolloff: 1.0,
            spatialization: true,
        }
    }
}

/// A folder of interchangeable sound effects played through one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfxCollectionConfig {
    pub name: String,
    pub folder: String,
    #[serde(default = "default_true")]
    pub avoid_repeat: bool,
    #[serde(default = "default_pitch")]
    pub pitch_min: f32,
    #[serde(default = "default_pitch")]
    pub pitch_max: f32,
    /// Skip files longer than this (0 = no limit)
    #[serde(default)]
    pub max_duration_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicTrackConfig {
    pub name: String,
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_pitch() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Interval of the background fade tick in milliseconds
    pub tick_interval_ms: u64,

    /// Engine-wide output volume applied on initialize (0.0-1.0)
    pub master_volume: f32,

    /// Runtime verbosity applied on initialize; `None` leaves the current
    /// process-wide level alone
    pub log_level: Option<LogLevel>,

    /// Extension matched (case-insensitively) when scanning folders
    pub audio_extension: String,

    /// Whether voices stream from disk or decode into memory
    pub streaming: StreamingPolicy,

    pub spatial: SpatialDefaults,

    /// Named sound effect collections for the SFX player
    pub sfx: Vec<SfxCollectionConfig>,

    /// Named music tracks for the music player
    pub music: Vec<MusicTrackConfig>,

    /// Restart the target track on every music transition instead of
    /// keeping all tracks running and cross-fading between them
    pub restart_music_on_transition: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16, // ~60 Hz
            master_volume: 1.0,
            log_level: None,
            audio_extension: "wav".to_string(),
            streaming: StreamingPolicy::default(),
            spatial: SpatialDefaults::default(),
            sfx: Vec::new(),
            music: Vec::new(),
            restart_music_on_transition: true,
        }
    }
}

impl AudioConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        let config: AudioConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        config.validate()?;
        tracing::info!("Loaded audio config from: {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Platform-specific default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("GameAudio"))
            .unwrap_or_else(|| PathBuf::from("config"))
            .join("audio.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.audio_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid(
                "audio_extension cannot be empty".to_string(),
            ));
        }
        for sfx in &self.sfx {
            if sfx.name.is_empty() || sfx.folder.is_empty() {
                return Err(ConfigError::Invalid(
                    "sfx collections need a name and a folder".to_string(),
                ));
            }
        }
        for track in &self.music {
            if track.name.is_empty() || track.path.is_empty() {
                return Err(ConfigError::Invalid(
                    "music tracks need a name and a path".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Extension without a leading dot
    pub fn extension(&self) -> &str {
        self.audio_extension.trim_start_matches('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert_eq!(config.tick_interval_ms, 16);
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.log_level, None);
        assert_eq!(config.extension(), "wav");
        assert!(config.spatial.spatialization);
        assert!(config.restart_music_on_transition);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = AudioConfig::default();
        config.sfx.push(SfxCollectionConfig {
            name: "footsteps".to_string(),
            folder: "sfx/footsteps".to_string(),
            avoid_repeat: true,
            pitch_min: 0.9,
            pitch_max: 1.1,
            max_duration_secs: 2.0,
        });
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AudioConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "tick_interval_ms": 10, "sfx": [ { "name": "hits", "folder": "sfx/hits" } ] }"#;
        let config: AudioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tick_interval_ms, 10);
        assert_eq!(config.extension(), "wav");
        assert!(config.sfx[0].avoid_repeat);
        assert_eq!(config.sfx[0].pitch_min, 1.0);
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let config = AudioConfig {
            tick_interval_ms: 0,
            ..AudioConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audio.json");

        let config = AudioConfig {
            master_volume: 0.5,
            log_level: Some(LogLevel::Info),
            ..AudioConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = AudioConfig::load(&path).unwrap();
        assert_eq!(loaded.master_volume, 0.5);
        assert_eq!(loaded.log_level, Some(LogLevel::Info));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AudioConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AudioConfig::default());
    }
}

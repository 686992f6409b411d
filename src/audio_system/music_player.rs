//! Named music tracks with cross-fade transitions.
//!
//! Each music track is a single-layer track whose layer shares the track's
//! name. Transitions fade the outgoing track to silence and the incoming one
//! to full volume. In restart mode the incoming track starts from the top on
//! every transition; otherwise every track keeps running and only the layer
//! volumes move.

use std::path::Path;
use std::time::Duration;

use super::manager::AudioManager;
use crate::config::MusicTrackConfig;
use crate::error::{AudioError, AudioResult};
use crate::handle::{GroupHandle, TrackHandle};

pub struct MusicPlayer {
    audio: AudioManager,
    group: Option<GroupHandle>,
    tracks: Vec<(String, TrackHandle)>,
    current: Option<String>,
    restart_on_transition: bool,
}

impl MusicPlayer {
    pub fn new(audio: &AudioManager, group: Option<GroupHandle>) -> Self {
        Self {
            audio: audio.clone(),
            group,
            tracks: Vec::new(),
            current: None,
            restart_on_transition: audio.config().restart_music_on_transition,
        }
    }

    /// Build a player from config entries. Tracks that fail to load are
    /// logged and skipped.
    pub fn from_config(
        audio: &AudioManager,
        group: Option<GroupHandle>,
        tracks: &[MusicTrackConfig],
    ) -> Self {
        let mut player = Self::new(audio, group);
        for track in tracks {
            if let Err(e) = player.add_track(&track.name, &track.path) {
                tracing::warn!("Failed to load music track '{}': {}", track.name, e);
            }
        }
        player
    }

    /// Register a silent, stopped track playing `path`
    pub fn add_track(&mut self, name: &str, path: impl AsRef<Path>) -> AudioResult<TrackHandle> {
        if name.is_empty() {
            return Err(AudioError::validation("Music track name cannot be empty"));
        }
        if self.track_handle(name).is_some() {
            return Err(AudioError::validation(format!(
                "Music track '{}' already exists",
                name
            )));
        }

        let track = self.audio.create_track()?;
        if let Err(e) = self.audio.add_layer(track, name, path, self.group) {
            if let Err(cleanup) = self.audio.destroy_track(track) {
                tracing::warn!("Failed to destroy music track '{}': {}", name, cleanup);
            }
            return Err(e);
        }
        self.tracks.push((name.to_string(), track));
        Ok(track)
    }

    pub fn track_handle(&self, name: &str) -> Option<TrackHandle> {
        self.tracks
            .iter()
            .find(|(track_name, _)| track_name == name)
            .map(|(_, handle)| *handle)
    }

    pub fn track_names(&self) -> Vec<&str> {
        self.tracks.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn restart_on_transition(&self) -> bool {
        self.restart_on_transition
    }

    pub fn set_restart_on_transition(&mut self, restart: bool) {
        self.restart_on_transition = restart;
    }

    fn require_track(&self, name: &str) -> AudioResult<TrackHandle> {
        self.track_handle(name)
            .ok_or_else(|| AudioError::validation(format!("Unknown music track '{}'", name)))
    }

    /// Fade, or jump when `duration` is zero
    fn ramp(&self, track: TrackHandle, name: &str, target: f32, duration: Duration) -> AudioResult<()> {
        if duration.is_zero() {
            self.audio.set_layer_volume(track, name, target)
        } else {
            self.audio.fade_layer(track, name, target, duration)
        }
    }

    /// Transition to `name` over `duration`.
    ///
    /// Asking for the current track makes sure it is playing and fades it
    /// back up to full volume.
    pub fn fade_to(&mut self, name: &str, duration: Duration) -> AudioResult<()> {
        let target = self.require_track(name)?;

        if self.current.as_deref() == Some(name) {
            tracing::debug!("Already on music track '{}'", name);
            self.audio.play_track(target)?;
            return self.ramp(target, name, 1.0, duration);
        }

        let previous = self.current.replace(name.to_string());
        tracing::info!(
            "Music transition {} -> {} over {:?}",
            previous.as_deref().unwrap_or("<none>"),
            name,
            duration
        );

        if self.restart_on_transition {
            if let Some(old) = previous.as_deref() {
                if let Some(old_track) = self.track_handle(old) {
                    self.ramp(old_track, old, 0.0, duration)?;
                }
            }
            self.audio.stop_track(target)?;
            self.audio.play_track(target)?;
            self.audio.set_layer_volume(target, name, 0.0)?;
        } else {
            for (track_name, track) in &self.tracks {
                self.audio.play_track(*track)?;
                if *track != target {
                    self.ramp(*track, track_name, 0.0, duration)?;
                }
            }
        }

        self.ramp(target, name, 1.0, duration)
    }

    /// Set a track's volume at once, cancelling any fade on it
    pub fn set_track_volume(&self, name: &str, volume: f32) -> AudioResult<()> {
        let track = self.require_track(name)?;
        self.audio.set_layer_volume(track, name, volume)
    }

    pub fn track_volume(&self, name: &str) -> AudioResult<f32> {
        let track = self.require_track(name)?;
        Ok(self.audio.layer_volume(track, name)?.unwrap_or(0.0))
    }

    pub fn stop_all(&mut self) -> AudioResult<()> {
        for (_, track) in &self.tracks {
            self.audio.stop_track(*track)?;
        }
        self.current = None;
        Ok(())
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        if !self.audio.is_initialized() {
            return;
        }
        for (name, track) in self.tracks.drain(..) {
            if let Err(e) = self.audio.destroy_track(track) {
                tracing::warn!("Failed to destroy music track '{}': {}", name, e);
            }
        }
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

    fn player_with(names: &[&str], restart: bool) -> (tempfile::TempDir, AudioManager, MusicPlayer) {
        let dir = tempfile::tempdir().unwrap();
        let manager = AudioManager::headless(AudioConfig::default());
        manager.initialize().unwrap();
        let mut player = MusicPlayer::new(&manager, None);
        player.set_restart_on_transition(restart);
        for name in names {
            let path = dir.path().join(format!("{}.wav", name));
            write_wav(&path);
            player.add_track(name, &path).unwrap();
        }
        (dir, manager, player)
    }

    #[test]
    fn test_added_tracks_start_silent_and_stopped() {
        let (_dir, manager, player) = player_with(&["menu", "battle"], true);
        assert_eq!(player.track_names(), vec!["menu", "battle"]);
        let menu = player.track_handle("menu").unwrap();
        assert!(!manager.is_track_playing(menu).unwrap());
        assert_eq!(player.track_volume("menu").unwrap(), 0.0);
        assert_eq!(player.current_track(), None);
    }

    #[test]
    fn test_failed_add_leaves_no_track() {
        let (dir, _manager, mut player) = player_with(&["menu"], true);
        let err = player.add_track("battle", dir.path().join("missing.wav")).unwrap_err();
        assert!(matches!(err, AudioError::FileLoad { .. }));
        assert_eq!(player.track_names(), vec!["menu"]);
        assert_eq!(player.track_handle("battle"), None);
    }

    #[test]
    fn test_duplicate_track_name_rejected() {
        let (dir, _manager, mut player) = player_with(&["menu"], true);
        let err = player.add_track("menu", dir.path().join("menu.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Validation(_)));
    }

    #[test]
    fn test_restart_transition_with_zero_duration() {
        let (_dir, manager, mut player) = player_with(&["menu", "battle"], true);
        player.fade_to("menu", Duration::ZERO).unwrap();
        assert_eq!(player.current_track(), Some("menu"));
        assert_eq!(player.track_volume("menu").unwrap(), 1.0);

        player.fade_to("battle", Duration::ZERO).unwrap();
        assert_eq!(player.current_track(), Some("battle"));
        assert_eq!(player.track_volume("menu").unwrap(), 0.0);
        assert_eq!(player.track_volume("battle").unwrap(), 1.0);
        assert!(manager.is_track_playing(player.track_handle("battle").unwrap()).unwrap());
    }

    #[test]
    fn test_continuous_transition_keeps_all_tracks_running() {
        let (_dir, manager, mut player) = player_with(&["menu", "battle", "boss"], false);
        player.fade_to("battle", Duration::from_secs(5)).unwrap();

        for name in ["menu", "battle", "boss"] {
            let track = player.track_handle(name).unwrap();
            assert!(manager.is_track_playing(track).unwrap());
        }
        let battle = player.track_handle("battle").unwrap();
        assert!(manager.is_layer_fading(battle, "battle").unwrap());
    }

    #[test]
    fn test_unknown_track_is_an_error() {
        let (_dir, _manager, mut player) = player_with(&["menu"], true);
        let err = player.fade_to("credits", Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, AudioError::Validation(_)));
        assert_eq!(player.current_track(), None);
    }

    #[test]
    fn test_stop_all_clears_current() {
        let (_dir, manager, mut player) = player_with(&["menu"], true);
        player.fade_to("menu", Duration::ZERO).unwrap();
        player.stop_all().unwrap();
        assert_eq!(player.current_track(), None);
        assert!(!manager.is_track_playing(player.track_handle("menu").unwrap()).unwrap());
    }

    #[test]
    fn test_drop_destroys_tracks() {
        let (_dir, manager, player) = player_with(&["menu"], true);
        let menu = player.track_handle("menu").unwrap();
        drop(player);
        assert!(manager.is_track_playing(menu).is_err());
    }
}

pub mod effects;
pub mod engine;
mod group;
pub mod headless;
pub mod manager;
pub mod music_player;
pub mod player;
pub mod random_container;
pub mod session;
pub mod sfx_player;
mod sound;
pub mod source;
mod track;

/// Audio system module
///
/// Handle-based playback layer for games:
/// - Layered tracks whose looping stems start together and fade independently
/// - Volume groups (buses) with timed fades
/// - Sounds with overlapping voices and listener-relative positioning
/// - Randomized containers for interchangeable effects
///
/// ## Architecture
///
/// ```text
/// AudioManager (clone = shared handle)
///   ├── Resources (behind one mutex)
///   │     ├── AudioTrack ── Layer ── Sound ─┐
///   │     ├── AudioGroup ── Bus             │ Voices
///   │     └── Sound ────────────────────────┘
///   ├── "audio-update" thread (fade tick)
///   └── AudioEngine
///         ├── RodioEngine    (output device)
///         └── HeadlessEngine (no device, tests)
/// ```
///
/// ## Usage
///
/// ```rust,no_run
/// use std::time::Duration;
/// use game_audio::{AudioConfig, AudioManager};
///
/// # fn main() -> game_audio::AudioResult<()> {
/// let audio = AudioManager::new(AudioConfig::default());
/// audio.initialize()?;
///
/// let music = audio.create_group("music")?;
/// let track = audio.create_track()?;
/// audio.add_layer(track, "drums", "music/drums.wav", Some(music))?;
/// audio.add_layer(track, "strings", "music/strings.wav", Some(music))?;
/// audio.play_track(track)?;
/// audio.fade_layer(track, "drums", 1.0, Duration::from_secs(2))?;
///
/// audio.shutdown();
/// # Ok(())
/// # }
/// ```
pub use effects::{Fade, FadeStep, PlaybackParams};
pub use engine::{AudioEngine, Bus, SharedGain, Voice, VoiceRequest};
pub use headless::{HeadlessEngine, HeadlessMonitor};
pub use manager::{AudioManager, EngineFactory};
pub use music_player::MusicPlayer;
pub use player::RodioEngine;
pub use random_container::{RandomContainerConfig, RandomSoundContainer};
pub use session::AudioSession;
pub use sfx_player::SfxPlayer;
pub use source::{LoadMode, StreamingPolicy};

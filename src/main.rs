use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use game_audio::error::AppResult;
use game_audio::logging;
use game_audio::{AudioConfig, AudioManager, AudioSession, LogLevel, MusicPlayer, SfxPlayer};

/// Entry point for the audio demo.
///
/// Usage: `game-audio-demo [config.json]`. Without an argument the platform
/// config path is used, falling back to defaults when absent.
fn main() -> AppResult<()> {
    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("GameAudio").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let _log_guard = logging::init_tracing(&log_dir, "game-audio.log");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AudioConfig::default_path);
    let config = AudioConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Crate logging is off unless configured
    if config.log_level.is_none() {
        AudioManager::set_log_level(LogLevel::Info);
    }

    let audio = AudioManager::new(config);
    let session = AudioSession::new(&audio).context("Failed to initialize audio")?;
    let audio = session.audio();

    let music_group = audio.create_group("music")?;
    let sfx_group = audio.create_group("sfx")?;

    let mut music = MusicPlayer::from_config(audio, Some(music_group), &audio.config().music);
    let mut sfx = SfxPlayer::from_config(audio, Some(sfx_group), &audio.config().sfx);

    tracing::info!(
        "Loaded {} music tracks and {} SFX collections",
        music.track_names().len(),
        sfx.collection_names().len()
    );

    let track_names: Vec<String> = music.track_names().into_iter().map(String::from).collect();
    let collection_names: Vec<String> =
        sfx.collection_names().into_iter().map(String::from).collect();

    if track_names.is_empty() && collection_names.is_empty() {
        tracing::warn!("Nothing to play; add `music` or `sfx` entries to the config");
        return Ok(());
    }

    for round in 0..track_names.len().max(1) {
        if let Some(name) = track_names.get(round) {
            music.fade_to(name, Duration::from_secs(2))?;
        }
        for _ in 0..8 {
            for name in &collection_names {
                sfx.play(name)?;
            }
            thread::sleep(Duration::from_millis(500));
        }
    }

    audio.fade_group(music_group, 0.0, Duration::from_secs(1))?;
    thread::sleep(Duration::from_secs(1));
    music.stop_all()?;
    sfx.stop_all()?;

    drop(music);
    drop(sfx);
    drop(session);
    tracing::info!("Audio demo finished");
    Ok(())
}

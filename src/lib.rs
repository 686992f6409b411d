//! Game audio layer: layered music tracks, volume groups with fades,
//! positional sounds and randomized effect containers, all addressed through
//! opaque handles on an explicit [`AudioManager`].

pub mod audio_system;
pub mod config;
pub mod decoder;
pub mod error;
pub mod handle;
pub mod logging;
pub mod spatial;
pub mod utils;

pub use audio_system::{
    AudioManager, AudioSession, MusicPlayer, RandomContainerConfig, RandomSoundContainer,
    SfxPlayer, StreamingPolicy,
};
pub use config::AudioConfig;
pub use error::{AudioError, AudioResult, ErrorKind};
pub use handle::{GroupHandle, SoundHandle, TrackHandle};
pub use logging::LogLevel;
pub use spatial::{Listener, SpatialParams, Vec3};

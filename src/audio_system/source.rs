/// How voices obtain their sample data
use std::fmt;

use serde::{Deserialize, Serialize};

/// Load strategy for a single voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Decode incrementally from disk while playing
    Streamed,

    /// Decode once and play from memory
    Buffered,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Streamed => write!(f, "streamed"),
            LoadMode::Buffered => write!(f, "buffered"),
        }
    }
}

/// Policy choosing a [`LoadMode`] for new voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingPolicy {
    /// Stream grouped or looping sounds (long-lived music and ambience),
    /// buffer ungrouped one-shots
    #[default]
    Heuristic,

    /// Stream everything
    Always,

    /// Buffer everything
    Never,
}

impl StreamingPolicy {
    pub fn mode_for(self, grouped: bool, looping: bool) -> LoadMode {
        let stream = match self {
            StreamingPolicy::Heuristic => grouped || looping,
            StreamingPolicy::Always => true,
            StreamingPolicy::Never => false,
        };
        if stream {
            LoadMode::Streamed
        } else {
            LoadMode::Buffered
        }
    }
}

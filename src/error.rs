use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::handle::HandleKind;

/// Library errors using thiserror for structured error handling.
///
/// Every fallible audio operation reports one of these categories. Callers
/// that only care about the category can branch on [`AudioError::kind`].
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio system not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Invalid {kind} handle: {value}")]
    InvalidHandle { kind: HandleKind, value: u32 },

    #[error("Failed to load audio file: {path}")]
    FileLoad {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Audio engine failure")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Error category, independent of payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotInitialized,
    InvalidHandle,
    FileLoad,
    Validation,
    Engine,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotInitialized => write!(f, "not initialized"),
            ErrorKind::InvalidHandle => write!(f, "invalid handle"),
            ErrorKind::FileLoad => write!(f, "file load"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Engine => write!(f, "engine"),
        }
    }
}

impl AudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AudioError::NotInitialized => ErrorKind::NotInitialized,
            AudioError::InvalidHandle { .. } => ErrorKind::InvalidHandle,
            AudioError::FileLoad { .. } => ErrorKind::FileLoad,
            AudioError::Validation(_) => ErrorKind::Validation,
            AudioError::Engine(_) => ErrorKind::Engine,
        }
    }

    pub(crate) fn file_load(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AudioError::FileLoad {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        AudioError::Validation(message.into())
    }

    pub(crate) fn engine(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        AudioError::Engine(source.into())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for every audio operation
pub type AudioResult<T> = Result<T, AudioError>;

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = AudioError::NotInitialized;
        assert_eq!(
            err.to_string(),
            "Audio system not initialized. Call initialize() first."
        );

        let err = AudioError::InvalidHandle {
            kind: HandleKind::Track,
            value: 42,
        };
        assert_eq!(err.to_string(), "Invalid track handle: 42");

        let err = AudioError::validation("layer name cannot be empty");
        assert_eq!(err.to_string(), "Invalid argument: layer name cannot be empty");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(AudioError::NotInitialized.kind(), ErrorKind::NotInitialized);
        assert_eq!(
            AudioError::file_load("missing.wav", "File not found").kind(),
            ErrorKind::FileLoad
        );
        assert_eq!(AudioError::engine("no device").kind(), ErrorKind::Engine);
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = AudioError::file_load("/test/missing.wav", io_err);

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Failed to load audio file: /test/missing.wav");

        let config_err = ConfigError::LoadFailed {
            path: "/test/config.json".to_string(),
            source: Box::new(io::Error::new(io::ErrorKind::NotFound, "missing")),
        };
        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/config.json"
        );
    }
}

//! Process-wide log verbosity for the audio core.
//!
//! The level is a single atomic that can be changed at any time. It only
//! gates which of this crate's `tracing` events reach the subscriber; the
//! audio core never changes behavior based on it.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{Level, Metadata};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{filter_fn, FilterFn};

/// Verbosity, ordered from quietest to noisiest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Off,
        }
    }

    /// Whether an event at `level` passes at this verbosity
    pub fn allows(self, level: &Level) -> bool {
        let required = if *level == Level::ERROR {
            LogLevel::Error
        } else if *level == Level::WARN {
            LogLevel::Warn
        } else if *level == Level::INFO {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        self != LogLevel::Off && required <= self
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Off
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Off => write!(f, "off"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Off as u8);

const CRATE_TARGET: &str = "game_audio";

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

fn is_enabled(metadata: &Metadata<'_>) -> bool {
    if !metadata.target().starts_with(CRATE_TARGET) {
        return true;
    }
    log_level().allows(metadata.level())
}

/// Per-layer filter applying the runtime level to this crate's events.
///
/// Events from other targets pass through untouched, leaving them to the
/// subscriber's own `EnvFilter`.
pub fn level_filter() -> FilterFn<fn(&Metadata<'_>) -> bool> {
    filter_fn(is_enabled as fn(&Metadata<'_>) -> bool)
}

/// Install a console + daily-rotating file subscriber.
///
/// Returns the appender guard; dropping it flushes and closes the log file.
/// Returns `None` when a global subscriber is already installed.
pub fn init_tracing(log_dir: &Path, file_name: &str) -> Option<WorkerGuard> {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(log_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("debug"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_filter(level_filter());

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_filter(level_filter());

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Log directory: {}", log_dir.display());
        Some(guard)
    } else {
        None
    }
}

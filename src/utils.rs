use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Check a path's extension against `extension`, ignoring case and any
/// leading dot on `extension`
pub fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// List regular files directly inside `dir` whose extension matches.
///
/// Non-recursive. Results are sorted so repeated scans are stable.
pub fn scan_audio_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
        if is_file && has_extension(&path, extension) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Clamp to the 0.0-1.0 gain range; NaN becomes silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

pub const MIN_PITCH: f32 = 0.1;
pub const MAX_PITCH: f32 = 10.0;

/// Clamp a playback-rate multiplier; NaN becomes the natural rate
pub fn clamp_pitch(pitch: f32) -> f32 {
    if pitch.is_nan() {
        1.0
    } else {
        pitch.clamp(MIN_PITCH, MAX_PITCH)
    }
}

//! Header-only duration probing
//!
//! WAV files are read through hound's header parser; everything else goes
//! through symphonia's format probe. Neither path decodes audio data.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AudioError, AudioResult};
use crate::utils::has_extension;

/// Length of an audio file computed from its header
pub fn probe_duration(path: &Path) -> AudioResult<Duration> {
    if has_extension(path, "wav") {
        probe_wav(path)
    } else {
        probe_container(path)
    }
}

fn probe_wav(path: &Path) -> AudioResult<Duration> {
    let reader = hound::WavReader::open(path).map_err(|e| AudioError::file_load(path, e))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AudioError::file_load(path, "WAV header has a zero sample rate"));
    }
    let frames = reader.duration() as f64;
    Ok(Duration::from_secs_f64(frames / spec.sample_rate as f64))
}

fn probe_container(path: &Path) -> AudioResult<Duration> {
    let src = File::open(path).map_err(|e| AudioError::file_load(path, e))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| AudioError::file_load(path, e))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::file_load(path, "No supported audio tracks found"))?;

    let params = &track.codec_params;
    let sample_rate = params
        .sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| AudioError::file_load(path, "Unknown sample rate"))?;
    let frames = params
        .n_frames
        .ok_or_else(|| AudioError::file_load(path, "Unknown frame count"))?;

    Ok(Duration::from_secs_f64(frames as f64 / sample_rate as f64))
}

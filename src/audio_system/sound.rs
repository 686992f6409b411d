//! A loaded sound: per-sound settings plus the voices currently playing it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use super::effects::PlaybackParams;
use super::engine::{AudioEngine, Bus, Voice, VoiceRequest};
use super::source::StreamingPolicy;
use crate::error::{AudioError, AudioResult};
use crate::handle::GroupHandle;
use crate::spatial::{SpatialParams, Vec3};
use crate::utils::{clamp_pitch, clamp_volume};

/// One playing instance
struct VoiceInstance {
    voice: Box<dyn Voice>,
}

impl VoiceInstance {
    fn is_finished(&self) -> bool {
        !self.voice.is_playing()
    }
}

pub(crate) struct Sound {
    path: PathBuf,
    params: PlaybackParams,
    spatial: SpatialParams,
    spatialization: bool,
    group: Option<GroupHandle>,
    bus: Option<Weak<dyn Bus>>,
    streaming: StreamingPolicy,
    instances: Vec<VoiceInstance>,
}

impl Sound {
    /// Validate `path` and record settings; no voice is created yet
    pub(crate) fn load(
        path: &Path,
        group: Option<(GroupHandle, &Arc<dyn Bus>)>,
        spatial: SpatialParams,
        spatialization: bool,
        streaming: StreamingPolicy,
    ) -> AudioResult<Self> {
        if path.as_os_str().is_empty() {
            return Err(AudioError::file_load(path, "File path cannot be empty"));
        }
        let metadata = std::fs::metadata(path).map_err(|e| AudioError::file_load(path, e))?;
        if !metadata.is_file() {
            return Err(AudioError::file_load(path, "Not a regular file"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            params: PlaybackParams::default(),
            spatial,
            spatialization,
            group: group.map(|(handle, _)| handle),
            bus: group.map(|(_, bus)| Arc::downgrade(bus)),
            streaming,
            instances: Vec::new(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn group(&self) -> Option<GroupHandle> {
        self.group
    }

    fn prune_finished(&mut self) {
        self.instances.retain(|instance| !instance.is_finished());
    }

    /// Start playback, optionally at `position`.
    ///
    /// A looping sound keeps at most one live voice: replaying it only makes
    /// sure that voice is running.
    pub(crate) fn play(
        &mut self,
        engine: &mut dyn AudioEngine,
        position: Option<Vec3>,
    ) -> AudioResult<()> {
        self.prune_finished();

        if self.params.looping {
            if let Some(instance) = self.instances.first_mut() {
                if !instance.voice.is_playing() {
                    instance.voice.start();
                }
                return Ok(());
            }
        }

        // A one-shot position applies to the new voice only
        let mut spatial = self.spatial;
        if let Some(position) = position {
            spatial.position = position;
        }

        let bus = self.bus.as_ref().and_then(Weak::upgrade);
        let request = VoiceRequest {
            path: &self.path,
            mode: self.streaming.mode_for(self.group.is_some(), self.params.looping),
            params: self.params,
            spatial: self.spatialization.then_some(spatial),
            bus,
        };
        let mut voice = engine.create_voice(request)?;
        voice.start();
        self.instances.push(VoiceInstance { voice });
        Ok(())
    }

    /// Stop and release every voice
    pub(crate) fn stop(&mut self) {
        for instance in &mut self.instances {
            instance.voice.stop();
        }
        self.instances.clear();
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.instances.iter().any(|instance| !instance.is_finished())
    }

    /// Live voices after dropping finished ones
    pub(crate) fn instance_count(&mut self) -> usize {
        self.prune_finished();
        self.instances.len()
    }

    pub(crate) fn volume(&self) -> f32 {
        self.params.volume
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.params.volume = clamp_volume(volume);
        let volume = self.params.volume;
        self.for_each_voice(|voice| voice.set_volume(volume));
    }

    pub(crate) fn pitch(&self) -> f32 {
        self.params.pitch
    }

    pub(crate) fn set_pitch(&mut self, pitch: f32) {
        self.params.pitch = clamp_pitch(pitch);
        let pitch = self.params.pitch;
        self.for_each_voice(|voice| voice.set_pitch(pitch));
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.params.looping
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.params.looping = looping;
        self.for_each_voice(|voice| voice.set_looping(looping));
    }

    pub(crate) fn spatial(&self) -> SpatialParams {
        self.spatial
    }

    pub(crate) fn spatialization(&self) -> bool {
        self.spatialization
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.spatial.position = position;
        self.push_spatial();
    }

    pub(crate) fn set_min_distance(&mut self, distance: f32) {
        self.spatial.set_min_distance(distance);
        self.push_spatial();
    }

    pub(crate) fn set_max_distance(&mut self, distance: f32) {
        self.spatial.set_max_distance(distance);
        self.push_spatial();
    }

    pub(crate) fn set_rolloff(&mut self, rolloff: f32) {
        self.spatial.set_rolloff(rolloff);
        self.push_spatial();
    }

    pub(crate) fn set_spatialization(&mut self, enabled: bool) {
        self.spatialization = enabled;
        self.push_spatial();
    }

    fn push_spatial(&mut self) {
        let spatial = self.spatialization.then_some(self.spatial);
        self.for_each_voice(|voice| voice.set_spatial(spatial));
    }

    fn for_each_voice(&mut self, mut apply: impl FnMut(&mut dyn Voice)) {
        for instance in &mut self.instances {
            apply(instance.voice.as_mut());
        }
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::headless::HeadlessEngine;
    use std::time::Duration;

    fn write_wav(path: &Path, millis: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..(8 * millis) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn load(path: &Path) -> Sound {
        Sound::load(
            path,
            None,
            SpatialParams::default(),
            true,
            StreamingPolicy::Heuristic,
        )
        .unwrap()
    }

    #[test]
    fn test_load_rejects_missing_and_empty_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Sound::load(
            &dir.path().join("missing.wav"),
            None,
            SpatialParams::default(),
            true,
            StreamingPolicy::Heuristic,
        );
        assert!(matches!(missing, Err(AudioError::FileLoad { .. })));

        let empty = Sound::load(
            Path::new(""),
            None,
            SpatialParams::default(),
            true,
            StreamingPolicy::Heuristic,
        );
        assert!(matches!(empty, Err(AudioError::FileLoad { .. })));
    }

    #[test]
    fn test_one_shots_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.wav");
        write_wav(&path, 500);

        let mut engine = HeadlessEngine::new();
        let mut sound = load(&path);
        sound.play(&mut engine, None).unwrap();
        sound.play(&mut engine, None).unwrap();
        sound.play(&mut engine, None).unwrap();
        assert_eq!(sound.instance_count(), 3);

        sound.stop();
        assert_eq!(sound.instance_count(), 0);
    }

    #[test]
    fn test_looping_keeps_single_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.wav");
        write_wav(&path, 50);

        let mut engine = HeadlessEngine::new();
        let mut sound = load(&path);
        sound.set_looping(true);
        for _ in 0..5 {
            sound.play(&mut engine, None).unwrap();
        }
        assert_eq!(sound.instance_count(), 1);
        assert!(sound.is_playing());
    }

    #[test]
    fn test_finished_instances_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blip.wav");
        write_wav(&path, 20);

        let mut engine = HeadlessEngine::new();
        let monitor = engine.monitor();
        let mut sound = load(&path);
        sound.play(&mut engine, None).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(sound.instance_count(), 0);
        assert_eq!(monitor.live_voices(), 0);
    }

    #[test]
    fn test_setters_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blip.wav");
        write_wav(&path, 20);

        let mut sound = load(&path);
        sound.set_volume(3.0);
        assert_eq!(sound.volume(), 1.0);
        sound.set_pitch(0.0);
        assert_eq!(sound.pitch(), 0.1);
        sound.set_pitch(50.0);
        assert_eq!(sound.pitch(), 10.0);
    }

    /// Headless engine that remembers the spatial settings of each voice
    struct RecordingEngine {
        inner: HeadlessEngine,
        requested: Vec<Option<SpatialParams>>,
    }

    impl AudioEngine for RecordingEngine {
        fn create_voice(&mut self, request: VoiceRequest<'_>) -> AudioResult<Box<dyn Voice>> {
            self.requested.push(request.spatial);
            self.inner.create_voice(request)
        }

        fn create_bus(&mut self) -> AudioResult<Arc<dyn Bus>> {
            self.inner.create_bus()
        }

        fn set_master_volume(&mut self, volume: f32) {
            self.inner.set_master_volume(volume);
        }

        fn master_volume(&self) -> f32 {
            self.inner.master_volume()
        }

        fn set_listener(&mut self, listener: crate::spatial::Listener) {
            self.inner.set_listener(listener);
        }

        fn listener(&self) -> crate::spatial::Listener {
            self.inner.listener()
        }
    }

    #[test]
    fn test_play_position_leaves_default_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blip.wav");
        write_wav(&path, 20);

        let mut engine = RecordingEngine {
            inner: HeadlessEngine::new(),
            requested: Vec::new(),
        };
        let mut sound = load(&path);
        sound.set_position(Vec3::new(1.0, 0.0, 0.0));

        sound
            .play(&mut engine, Some(Vec3::new(50.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(sound.spatial().position, Vec3::new(1.0, 0.0, 0.0));

        sound.play(&mut engine, None).unwrap();
        let positions: Vec<Vec3> = engine
            .requested
            .iter()
            .map(|spatial| spatial.unwrap().position)
            .collect();
        assert_eq!(
            positions,
            vec![Vec3::new(50.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)]
        );
    }
}

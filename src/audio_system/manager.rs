/// Audio manager
///
/// Owns every track, group and sound behind opaque handles, plus the single
/// engine instance, and runs the background tick that advances fades.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::engine::{AudioEngine, Bus};
use super::group::AudioGroup;
use super::headless::HeadlessEngine;
use super::player::RodioEngine;
use super::sound::Sound;
use super::track::AudioTrack;
use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};
use crate::handle::{GroupHandle, HandleCounter, SoundHandle, TrackHandle};
use crate::logging::{self, LogLevel};
use crate::spatial::{Listener, SpatialParams, Vec3};
use crate::utils::scan_audio_files;

/// Builds a fresh engine on each `initialize`
pub type EngineFactory = Arc<dyn Fn() -> AudioResult<Box<dyn AudioEngine>> + Send + Sync>;

/// Explicit audio context.
///
/// Cloning is cheap and every clone refers to the same state. All methods
/// take `&self` and may be called from any thread.
#[derive(Clone)]
pub struct AudioManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: AudioConfig,
    engine_factory: EngineFactory,
    running: AtomicBool,
    /// Serializes initialize/shutdown
    lifecycle: Mutex<()>,
    resources: Arc<Mutex<Resources>>,
    update_thread: Mutex<Option<thread::JoinHandle<()>>>,
    update_stop_tx: Mutex<Option<Sender<()>>>,
    next_track: HandleCounter,
    next_group: HandleCounter,
    next_sound: HandleCounter,
}

struct Resources {
    /// Present exactly while the manager is initialized
    engine: Option<Box<dyn AudioEngine>>,
    tracks: HashMap<TrackHandle, AudioTrack>,
    groups: HashMap<GroupHandle, AudioGroup>,
    group_names: HashMap<String, GroupHandle>,
    sounds: HashMap<SoundHandle, Sound>,
    folder_cache: HashMap<PathBuf, Vec<SoundHandle>>,
    rng: StdRng,
}

impl Resources {
    fn new() -> Self {
        Self {
            engine: None,
            tracks: HashMap::new(),
            groups: HashMap::new(),
            group_names: HashMap::new(),
            sounds: HashMap::new(),
            folder_cache: HashMap::new(),
            rng: StdRng::from_entropy(),
        }
    }

    fn engine_mut(&mut self) -> AudioResult<&mut dyn AudioEngine> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(AudioError::NotInitialized),
        }
    }

    fn engine(&self) -> AudioResult<&dyn AudioEngine> {
        match self.engine.as_deref() {
            Some(engine) => Ok(engine),
            None => Err(AudioError::NotInitialized),
        }
    }

    fn track_mut(&mut self, handle: TrackHandle) -> AudioResult<&mut AudioTrack> {
        self.tracks.get_mut(&handle).ok_or_else(|| handle.not_found())
    }

    fn track(&self, handle: TrackHandle) -> AudioResult<&AudioTrack> {
        self.tracks.get(&handle).ok_or_else(|| handle.not_found())
    }

    fn group_mut(&mut self, handle: GroupHandle) -> AudioResult<&mut AudioGroup> {
        self.groups.get_mut(&handle).ok_or_else(|| handle.not_found())
    }

    fn group(&self, handle: GroupHandle) -> AudioResult<&AudioGroup> {
        self.groups.get(&handle).ok_or_else(|| handle.not_found())
    }

    fn sound_mut(&mut self, handle: SoundHandle) -> AudioResult<&mut Sound> {
        self.sounds.get_mut(&handle).ok_or_else(|| handle.not_found())
    }

    fn sound(&self, handle: SoundHandle) -> AudioResult<&Sound> {
        self.sounds.get(&handle).ok_or_else(|| handle.not_found())
    }

    /// Resolve an optional group to its bus
    fn bus_for(&self, group: Option<GroupHandle>) -> AudioResult<Option<(GroupHandle, Arc<dyn Bus>)>> {
        match group {
            Some(handle) => Ok(Some((handle, Arc::clone(self.group(handle)?.bus())))),
            None => Ok(None),
        }
    }

    fn play_sound(&mut self, handle: SoundHandle, position: Option<Vec3>) -> AudioResult<()> {
        let Resources { engine, sounds, .. } = self;
        let engine = engine.as_deref_mut().ok_or(AudioError::NotInitialized)?;
        let sound = sounds.get_mut(&handle).ok_or_else(|| handle.not_found())?;
        sound.play(engine, position)
    }

    /// Advance every fade: track layers first, then groups
    fn update(&mut self, now: Instant) {
        for track in self.tracks.values_mut() {
            track.update(now);
        }
        for group in self.groups.values_mut() {
            group.update(now);
        }
    }
}

fn run_update_loop(resources: Arc<Mutex<Resources>>, stop_rx: Receiver<()>, tick: Duration) {
    tracing::debug!("Audio update thread started ({:?} tick)", tick);
    loop {
        match stop_rx.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => resources.lock().update(Instant::now()),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!("Audio update thread stopped");
}

fn require_fade_duration(duration: Duration) -> AudioResult<()> {
    if duration.is_zero() {
        return Err(AudioError::validation("Fade duration must be positive"));
    }
    Ok(())
}

impl ManagerInner {
    fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock();
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(tx) = self.update_stop_tx.lock().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.update_thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Audio update thread panicked");
            }
        }

        let engine = {
            let mut resources = self.resources.lock();
            for track in resources.tracks.values_mut() {
                track.stop();
            }
            for sound in resources.sounds.values_mut() {
                sound.stop();
            }
            resources.tracks.clear();
            resources.sounds.clear();
            resources.folder_cache.clear();
            resources.groups.clear();
            resources.group_names.clear();
            resources.engine.take()
        };
        drop(engine);

        tracing::info!("Audio system shut down");
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioManager {
    /// Manager that plays through the default output device
    pub fn new(config: AudioConfig) -> Self {
        Self::with_engine(
            config,
            Arc::new(|| RodioEngine::new().map(|engine| Box::new(engine) as Box<dyn AudioEngine>)),
        )
    }

    /// Manager with no audio device
    pub fn headless(config: AudioConfig) -> Self {
        Self::with_engine(
            config,
            Arc::new(|| -> AudioResult<Box<dyn AudioEngine>> {
                Ok(Box::new(HeadlessEngine::new()))
            }),
        )
    }

    pub fn with_engine(config: AudioConfig, engine_factory: EngineFactory) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                engine_factory,
                running: AtomicBool::new(false),
                lifecycle: Mutex::new(()),
                resources: Arc::new(Mutex::new(Resources::new())),
                update_thread: Mutex::new(None),
                update_stop_tx: Mutex::new(None),
                next_track: HandleCounter::new(),
                next_group: HandleCounter::new(),
                next_sound: HandleCounter::new(),
            }),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.inner.config
    }

    pub fn set_log_level(level: LogLevel) {
        logging::set_log_level(level);
    }

    pub fn log_level() -> LogLevel {
        logging::log_level()
    }

    /// Lock the resource tables, failing unless initialized
    fn resources(&self) -> AudioResult<MutexGuard<'_, Resources>> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(AudioError::NotInitialized);
        }
        let resources = self.inner.resources.lock();
        if resources.engine.is_none() {
            return Err(AudioError::NotInitialized);
        }
        Ok(resources)
    }

    fn spatial_defaults(&self) -> (SpatialParams, bool) {
        let defaults = &self.inner.config.spatial;
        (SpatialParams::from_defaults(defaults), defaults.spatialization)
    }

    fn load(
        &self,
        path: &Path,
        bus: Option<&(GroupHandle, Arc<dyn Bus>)>,
    ) -> AudioResult<Sound> {
        let (spatial, spatialization) = self.spatial_defaults();
        Sound::load(
            path,
            bus.map(|(handle, bus)| (*handle, bus)),
            spatial,
            spatialization,
            self.inner.config.streaming,
        )
    }

    // ---- lifecycle ----

    /// Create the engine and start the update thread.
    ///
    /// Returns `Ok(false)` when already initialized.
    pub fn initialize(&self) -> AudioResult<bool> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock();
        if inner.running.load(Ordering::SeqCst) {
            tracing::warn!("Audio system already initialized");
            return Ok(false);
        }

        if let Some(level) = inner.config.log_level {
            logging::set_log_level(level);
        }

        let mut engine = (inner.engine_factory)()?;
        engine.set_master_volume(inner.config.master_volume);
        inner.resources.lock().engine = Some(engine);

        let (stop_tx, stop_rx) = bounded(1);
        let resources = Arc::clone(&inner.resources);
        let tick = inner.config.tick_interval();
        let spawned = thread::Builder::new()
            .name("audio-update".to_string())
            .spawn(move || run_update_loop(resources, stop_rx, tick));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                inner.resources.lock().engine = None;
                return Err(AudioError::engine(e));
            }
        };

        *inner.update_stop_tx.lock() = Some(stop_tx);
        *inner.update_thread.lock() = Some(handle);
        inner.running.store(true, Ordering::SeqCst);

        tracing::info!("Audio system initialized");
        Ok(true)
    }

    /// Stop the update thread, stop and release every resource, then the
    /// engine. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    // ---- tracks ----

    pub fn create_track(&self) -> AudioResult<TrackHandle> {
        let mut resources = self.resources()?;
        let handle = TrackHandle::from_raw(self.inner.next_track.next());
        resources.tracks.insert(handle, AudioTrack::new());
        tracing::debug!("Created {}", handle);
        Ok(handle)
    }

    /// Unknown handles are ignored
    pub fn destroy_track(&self, track: TrackHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        if let Some(mut removed) = resources.tracks.remove(&track) {
            removed.stop();
            tracing::debug!("Destroyed {}", track);
        }
        Ok(())
    }

    /// Add a looping layer that starts silent
    pub fn add_layer(
        &self,
        track: TrackHandle,
        layer_name: &str,
        path: impl AsRef<Path>,
        group: Option<GroupHandle>,
    ) -> AudioResult<()> {
        let path = path.as_ref();
        let mut resources = self.resources()?;
        if layer_name.is_empty() {
            return Err(AudioError::validation("Layer name cannot be empty"));
        }
        if path.as_os_str().is_empty() {
            return Err(AudioError::validation("File path cannot be empty"));
        }

        resources.track(track)?;
        let bus = resources.bus_for(group)?;
        let sound = self.load(path, bus.as_ref())?;

        let Resources { engine, tracks, .. } = &mut *resources;
        let engine = engine.as_deref_mut().ok_or(AudioError::NotInitialized)?;
        let target = tracks.get_mut(&track).ok_or_else(|| track.not_found())?;
        target.add_layer(engine, layer_name, sound)?;

        tracing::debug!("Added layer '{}' to {} from {}", layer_name, track, path.display());
        Ok(())
    }

    /// Unknown layer names are ignored
    pub fn remove_layer(&self, track: TrackHandle, layer_name: &str) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.track_mut(track)?.remove_layer(layer_name);
        Ok(())
    }

    pub fn play_track(&self, track: TrackHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        let Resources { engine, tracks, .. } = &mut *resources;
        let engine = engine.as_deref_mut().ok_or(AudioError::NotInitialized)?;
        let target = tracks.get_mut(&track).ok_or_else(|| track.not_found())?;
        target.play(engine)
    }

    pub fn stop_track(&self, track: TrackHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.track_mut(track)?.stop();
        Ok(())
    }

    pub fn is_track_playing(&self, track: TrackHandle) -> AudioResult<bool> {
        let resources = self.resources()?;
        Ok(resources.track(track)?.is_playing())
    }

    /// Set a layer's volume immediately, cancelling any fade on it
    pub fn set_layer_volume(&self, track: TrackHandle, layer_name: &str, volume: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.track_mut(track)?.set_layer_volume(layer_name, volume);
        Ok(())
    }

    /// Fade a layer from its current volume to `target_volume`
    pub fn fade_layer(
        &self,
        track: TrackHandle,
        layer_name: &str,
        target_volume: f32,
        duration: Duration,
    ) -> AudioResult<()> {
        let mut resources = self.resources()?;
        require_fade_duration(duration)?;
        resources
            .track_mut(track)?
            .fade_layer(layer_name, target_volume, duration, Instant::now());
        Ok(())
    }

    /// Current volume of a layer, `None` when the track has no such layer
    pub fn layer_volume(&self, track: TrackHandle, layer_name: &str) -> AudioResult<Option<f32>> {
        let resources = self.resources()?;
        Ok(resources.track(track)?.layer_volume(layer_name))
    }

    pub fn is_layer_fading(&self, track: TrackHandle, layer_name: &str) -> AudioResult<bool> {
        let resources = self.resources()?;
        Ok(resources.track(track)?.is_layer_fading(layer_name).unwrap_or(false))
    }

    /// Layer names in insertion order
    pub fn layer_names(&self, track: TrackHandle) -> AudioResult<Vec<String>> {
        let resources = self.resources()?;
        Ok(resources.track(track)?.layer_names())
    }

    // ---- groups ----

    /// Create a volume bus. An empty name creates an unnamed group; a name
    /// already in use is rebound to the new group.
    pub fn create_group(&self, name: &str) -> AudioResult<GroupHandle> {
        let mut resources = self.resources()?;
        let bus = resources.engine_mut()?.create_bus()?;
        let handle = GroupHandle::from_raw(self.inner.next_group.next());

        let name = (!name.is_empty()).then(|| name.to_string());
        if let Some(name) = &name {
            if let Some(previous) = resources.group_names.insert(name.clone(), handle) {
                tracing::warn!("Group name '{}' moved from {} to {}", name, previous, handle);
            }
        }
        resources.groups.insert(handle, AudioGroup::new(name, bus));

        tracing::debug!("Created {}", handle);
        Ok(handle)
    }

    pub fn find_group(&self, name: &str) -> AudioResult<Option<GroupHandle>> {
        let resources = self.resources()?;
        Ok(resources.group_names.get(name).copied())
    }

    /// Unknown handles are ignored. Sounds routed through the group keep
    /// playing, unattached.
    pub fn destroy_group(&self, group: GroupHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        if let Some(removed) = resources.groups.remove(&group) {
            if let Some(name) = removed.name() {
                if resources.group_names.get(name) == Some(&group) {
                    resources.group_names.remove(name);
                }
            }
            tracing::debug!("Destroyed {}", group);
        }
        Ok(())
    }

    /// Set a group's volume immediately, cancelling any fade on it
    pub fn set_group_volume(&self, group: GroupHandle, volume: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.group_mut(group)?.set_volume(volume);
        Ok(())
    }

    pub fn group_volume(&self, group: GroupHandle) -> AudioResult<f32> {
        let resources = self.resources()?;
        Ok(resources.group(group)?.volume())
    }

    /// Fade a group from its current volume to `target_volume`
    pub fn fade_group(&self, group: GroupHandle, target_volume: f32, duration: Duration) -> AudioResult<()> {
        let mut resources = self.resources()?;
        require_fade_duration(duration)?;
        resources
            .group_mut(group)?
            .fade_to(target_volume, duration, Instant::now());
        Ok(())
    }

    pub fn is_group_fading(&self, group: GroupHandle) -> AudioResult<bool> {
        let resources = self.resources()?;
        Ok(resources.group(group)?.is_fading())
    }

    /// Fade target, or the current volume when not fading
    pub fn group_target_volume(&self, group: GroupHandle) -> AudioResult<f32> {
        let resources = self.resources()?;
        Ok(resources.group(group)?.target_volume())
    }

    pub fn set_master_volume(&self, volume: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.engine_mut()?.set_master_volume(volume);
        Ok(())
    }

    pub fn master_volume(&self) -> AudioResult<f32> {
        let resources = self.resources()?;
        Ok(resources.engine()?.master_volume())
    }

    // ---- sounds ----

    /// Register a sound file, optionally routed through a group
    pub fn load_sound(&self, path: impl AsRef<Path>, group: Option<GroupHandle>) -> AudioResult<SoundHandle> {
        let path = path.as_ref();
        let mut resources = self.resources()?;
        let bus = resources.bus_for(group)?;
        let sound = self.load(path, bus.as_ref())?;

        let handle = SoundHandle::from_raw(self.inner.next_sound.next());
        resources.sounds.insert(handle, sound);
        tracing::debug!("Loaded {} from {}", handle, path.display());
        Ok(handle)
    }

    /// Stop and release a sound; unknown handles are ignored
    pub fn unload_sound(&self, sound: SoundHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        if let Some(mut removed) = resources.sounds.remove(&sound) {
            removed.stop();
            tracing::debug!("Unloaded {}", sound);
        }
        Ok(())
    }

    pub fn play_sound(&self, sound: SoundHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.play_sound(sound, None)
    }

    /// Play with the emitter moved to `position` first
    pub fn play_sound_at(&self, sound: SoundHandle, position: Vec3) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.play_sound(sound, Some(position))
    }

    pub fn stop_sound(&self, sound: SoundHandle) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.stop();
        Ok(())
    }

    pub fn is_sound_playing(&self, sound: SoundHandle) -> AudioResult<bool> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.is_playing())
    }

    /// Live voices of a sound, after pruning finished ones
    pub fn sound_instance_count(&self, sound: SoundHandle) -> AudioResult<usize> {
        let mut resources = self.resources()?;
        Ok(resources.sound_mut(sound)?.instance_count())
    }

    pub fn set_sound_volume(&self, sound: SoundHandle, volume: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_volume(volume);
        Ok(())
    }

    pub fn sound_volume(&self, sound: SoundHandle) -> AudioResult<f32> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.volume())
    }

    pub fn set_sound_pitch(&self, sound: SoundHandle, pitch: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_pitch(pitch);
        Ok(())
    }

    pub fn sound_pitch(&self, sound: SoundHandle) -> AudioResult<f32> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.pitch())
    }

    pub fn set_sound_looping(&self, sound: SoundHandle, looping: bool) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_looping(looping);
        Ok(())
    }

    pub fn is_sound_looping(&self, sound: SoundHandle) -> AudioResult<bool> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.is_looping())
    }

    pub fn sound_group(&self, sound: SoundHandle) -> AudioResult<Option<GroupHandle>> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.group())
    }

    pub fn sound_path(&self, sound: SoundHandle) -> AudioResult<PathBuf> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.path().to_path_buf())
    }

    pub fn set_sound_position(&self, sound: SoundHandle, position: Vec3) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_position(position);
        Ok(())
    }

    /// Non-positive distances clamp to a small positive floor
    pub fn set_sound_min_distance(&self, sound: SoundHandle, distance: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_min_distance(distance);
        Ok(())
    }

    pub fn set_sound_max_distance(&self, sound: SoundHandle, distance: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_max_distance(distance);
        Ok(())
    }

    /// Negative rolloff clamps to zero (no attenuation)
    pub fn set_sound_rolloff(&self, sound: SoundHandle, rolloff: f32) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_rolloff(rolloff);
        Ok(())
    }

    pub fn set_sound_spatialization(&self, sound: SoundHandle, enabled: bool) -> AudioResult<()> {
        let mut resources = self.resources()?;
        resources.sound_mut(sound)?.set_spatialization(enabled);
        Ok(())
    }

    pub fn sound_spatial(&self, sound: SoundHandle) -> AudioResult<SpatialParams> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.spatial())
    }

    pub fn is_sound_spatialized(&self, sound: SoundHandle) -> AudioResult<bool> {
        let resources = self.resources()?;
        Ok(resources.sound(sound)?.spatialization())
    }

    /// Play a random file from `folder`.
    ///
    /// The folder is scanned once and its sounds are cached; the cache is
    /// rebuilt when every cached sound has been unloaded. Returns `Ok(None)`
    /// when the folder holds no matching files.
    pub fn play_random_sound_from_folder(
        &self,
        folder: impl AsRef<Path>,
        group: Option<GroupHandle>,
    ) -> AudioResult<Option<SoundHandle>> {
        let folder = folder.as_ref();
        let mut guard = self.resources()?;
        if folder.as_os_str().is_empty() {
            return Err(AudioError::validation("Folder path cannot be empty"));
        }
        let resources = &mut *guard;
        let bus = resources.bus_for(group)?;

        let cached: Vec<SoundHandle> = resources
            .folder_cache
            .get(folder)
            .map(|handles| {
                handles
                    .iter()
                    .copied()
                    .filter(|handle| resources.sounds.contains_key(handle))
                    .collect()
            })
            .unwrap_or_default();

        let handles = if cached.is_empty() {
            let files = scan_audio_files(folder, self.inner.config.extension())
                .map_err(|e| AudioError::file_load(folder, e))?;

            let mut loaded = Vec::with_capacity(files.len());
            for file in &files {
                match self.load(file, bus.as_ref()) {
                    Ok(sound) => {
                        let handle = SoundHandle::from_raw(self.inner.next_sound.next());
                        resources.sounds.insert(handle, sound);
                        loaded.push(handle);
                    }
                    Err(e) => tracing::warn!("Skipping {}: {}", file.display(), e),
                }
            }

            if loaded.is_empty() {
                resources.folder_cache.remove(folder);
                tracing::warn!(
                    "No .{} files found in {}",
                    self.inner.config.extension(),
                    folder.display()
                );
                return Ok(None);
            }
            tracing::debug!("Cached {} sounds from {}", loaded.len(), folder.display());
            loaded
        } else {
            cached
        };
        resources
            .folder_cache
            .insert(folder.to_path_buf(), handles.clone());

        let pick = handles[resources.rng.gen_range(0..handles.len())];
        resources.play_sound(pick, None)?;
        Ok(Some(pick))
    }

    // ---- listener ----

    pub fn listener(&self) -> AudioResult<Listener> {
        let resources = self.resources()?;
        Ok(resources.engine()?.listener())
    }

    pub fn set_listener_position(&self, position: Vec3) -> AudioResult<()> {
        self.update_listener(|listener| listener.position = position)
    }

    /// Forward direction; normalized, zero vectors are ignored
    pub fn set_listener_direction(&self, direction: Vec3) -> AudioResult<()> {
        match direction.try_normalize() {
            Some(direction) => self.update_listener(|listener| listener.direction = direction),
            None => {
                self.resources()?;
                tracing::warn!("Ignoring zero listener direction");
                Ok(())
            }
        }
    }

    /// Up vector; normalized, zero vectors are ignored
    pub fn set_listener_up(&self, up: Vec3) -> AudioResult<()> {
        match up.try_normalize() {
            Some(up) => self.update_listener(|listener| listener.up = up),
            None => {
                self.resources()?;
                tracing::warn!("Ignoring zero listener up vector");
                Ok(())
            }
        }
    }

    fn update_listener(&self, apply: impl FnOnce(&mut Listener)) -> AudioResult<()> {
        let mut resources = self.resources()?;
        let engine = resources.engine_mut()?;
        let mut listener = engine.listener();
        apply(&mut listener);
        engine.set_listener(listener);
        Ok(())
    }

    /// File length from its header, without decoding
    pub fn probe_duration(&self, path: impl AsRef<Path>) -> AudioResult<Duration> {
        let resources = self.resources()?;
        resources.engine()?.probe_duration(path.as_ref())
    }
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new(AudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::headless::HeadlessMonitor;
    use crate::error::ErrorKind;

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

    fn manager() -> AudioManager {
        let manager = AudioManager::headless(AudioConfig::default());
        assert!(manager.initialize().unwrap());
        manager
    }

    #[test]
    fn test_manager_creation() {
        let manager = AudioManager::headless(AudioConfig::default());
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_initialize_twice_returns_false() {
        let manager = manager();
        assert!(!manager.initialize().unwrap());
        manager.shutdown();
        manager.shutdown();
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_operations_require_initialize() {
        let manager = AudioManager::headless(AudioConfig::default());
        assert_eq!(
            manager.create_track().unwrap_err().kind(),
            ErrorKind::NotInitialized
        );
        assert_eq!(
            manager.master_volume().unwrap_err().kind(),
            ErrorKind::NotInitialized
        );
    }

    #[test]
    fn test_engine_failure_is_reported() {
        let manager = AudioManager::with_engine(
            AudioConfig::default(),
            Arc::new(|| -> AudioResult<Box<dyn AudioEngine>> {
                Err(AudioError::engine("no output device"))
            }),
        );
        assert_eq!(manager.initialize().unwrap_err().kind(), ErrorKind::Engine);
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_handles_are_unique_across_sessions() {
        let manager = manager();
        let first = manager.create_track().unwrap();
        let second = manager.create_track().unwrap();
        assert_ne!(first, second);
        manager.shutdown();

        manager.initialize().unwrap();
        let third = manager.create_track().unwrap();
        assert!(third.value() > second.value());
        assert_eq!(
            manager.is_track_playing(first).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let manager = manager();
        let track = manager.create_track().unwrap();
        manager.destroy_track(track).unwrap();
        manager.destroy_track(track).unwrap();
        manager.destroy_track(TrackHandle::invalid()).unwrap();
        manager.destroy_group(GroupHandle::from_raw(999)).unwrap();
        manager.unload_sound(SoundHandle::from_raw(999)).unwrap();
    }

    #[test]
    fn test_add_layer_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stem.wav");
        write_wav(&path, 50);

        let manager = manager();
        let track = manager.create_track().unwrap();
        assert_eq!(
            manager.add_layer(track, "", &path, None).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            manager.add_layer(track, "drums", "", None).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            manager
                .add_layer(track, "drums", dir.path().join("missing.wav"), None)
                .unwrap_err()
                .kind(),
            ErrorKind::FileLoad
        );
        assert_eq!(
            manager
                .add_layer(track, "drums", &path, Some(GroupHandle::from_raw(77)))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidHandle
        );
        manager.add_layer(track, "drums", &path, None).unwrap();
        assert_eq!(manager.layer_volume(track, "drums").unwrap(), Some(0.0));
    }

    #[test]
    fn test_fade_duration_must_be_positive() {
        let manager = manager();
        let group = manager.create_group("music").unwrap();
        assert_eq!(
            manager
                .fade_group(group, 0.0, Duration::ZERO)
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_group_names() {
        let manager = manager();
        let music = manager.create_group("music").unwrap();
        let unnamed = manager.create_group("").unwrap();
        assert_ne!(music, unnamed);
        assert_eq!(manager.find_group("music").unwrap(), Some(music));
        assert_eq!(manager.find_group("").unwrap(), None);

        manager.destroy_group(music).unwrap();
        assert_eq!(manager.find_group("music").unwrap(), None);
    }

    #[test]
    fn test_master_volume_clamps() {
        let manager = manager();
        manager.set_master_volume(2.0).unwrap();
        assert_eq!(manager.master_volume().unwrap(), 1.0);
        manager.set_master_volume(-1.0).unwrap();
        assert_eq!(manager.master_volume().unwrap(), 0.0);
    }

    #[test]
    fn test_listener_direction_is_normalized() {
        let manager = manager();
        manager
            .set_listener_direction(Vec3::new(0.0, 0.0, -5.0))
            .unwrap();
        assert_eq!(manager.listener().unwrap().direction, Vec3::NEG_Z);

        manager.set_listener_direction(Vec3::ZERO).unwrap();
        assert_eq!(manager.listener().unwrap().direction, Vec3::NEG_Z);
    }

    #[test]
    fn test_shutdown_releases_voices_before_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.wav");
        write_wav(&path, 50);

        let monitor = HeadlessMonitor::new();
        let factory_monitor = monitor.clone();
        let manager = AudioManager::with_engine(
            AudioConfig::default(),
            Arc::new(move || -> AudioResult<Box<dyn AudioEngine>> {
                Ok(Box::new(HeadlessEngine::with_monitor(factory_monitor.clone())))
            }),
        );
        manager.initialize().unwrap();

        let sound = manager.load_sound(&path, None).unwrap();
        manager.set_sound_looping(sound, true).unwrap();
        manager.play_sound(sound).unwrap();
        assert_eq!(monitor.live_voices(), 1);

        manager.shutdown();
        assert_eq!(monitor.live_voices(), 0);
        assert_eq!(monitor.engines_dropped(), 1);
        assert_eq!(monitor.unclean_teardowns(), 0);
    }

    #[test]
    fn test_dropping_last_clone_shuts_down() {
        let monitor = HeadlessMonitor::new();
        let factory_monitor = monitor.clone();
        let manager = AudioManager::with_engine(
            AudioConfig::default(),
            Arc::new(move || -> AudioResult<Box<dyn AudioEngine>> {
                Ok(Box::new(HeadlessEngine::with_monitor(factory_monitor.clone())))
            }),
        );
        manager.initialize().unwrap();
        let clone = manager.clone();
        drop(manager);
        assert!(clone.is_initialized());
        drop(clone);
        assert_eq!(monitor.engines_dropped(), 1);
    }
}

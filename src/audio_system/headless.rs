//! Device-less engine.
//!
//! Voices validate and probe their file like a real engine would, then keep
//! time against the wall clock: a one-shot "plays" for its header length
//! (scaled by pitch), a looping voice plays until stopped. Useful for
//! dedicated servers and for tests that must not depend on audio hardware.

use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::effects::PlaybackParams;
use super::engine::{AudioEngine, Bus, SharedGain, Voice, VoiceRequest};
use super::source::LoadMode;
use crate::decoder;
use crate::error::{AudioError, AudioResult};
use crate::spatial::{Listener, SpatialParams};
use crate::utils::{clamp_pitch, clamp_volume};

#[derive(Debug, Default)]
struct MonitorState {
    live_voices: AtomicUsize,
    voices_created: AtomicUsize,
    engines_dropped: AtomicUsize,
    unclean_teardowns: AtomicUsize,
}

/// Counters shared between a headless engine, its voices and observers
#[derive(Debug, Clone, Default)]
pub struct HeadlessMonitor {
    state: Arc<MonitorState>,
}

impl HeadlessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Voices created and not yet dropped
    pub fn live_voices(&self) -> usize {
        self.state.live_voices.load(Ordering::SeqCst)
    }

    pub fn voices_created(&self) -> usize {
        self.state.voices_created.load(Ordering::SeqCst)
    }

    pub fn engines_dropped(&self) -> usize {
        self.state.engines_dropped.load(Ordering::SeqCst)
    }

    /// Engines torn down while voices were still alive
    pub fn unclean_teardowns(&self) -> usize {
        self.state.unclean_teardowns.load(Ordering::SeqCst)
    }
}

pub struct HeadlessEngine {
    master: f32,
    listener: Listener,
    monitor: HeadlessMonitor,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::with_monitor(HeadlessMonitor::new())
    }

    pub fn with_monitor(monitor: HeadlessMonitor) -> Self {
        Self {
            master: 1.0,
            listener: Listener::default(),
            monitor,
        }
    }

    pub fn monitor(&self) -> HeadlessMonitor {
        self.monitor.clone()
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for HeadlessEngine {
    fn create_voice(&mut self, request: VoiceRequest<'_>) -> AudioResult<Box<dyn Voice>> {
        File::open(request.path).map_err(|e| AudioError::file_load(request.path, e))?;
        let length = decoder::probe_duration(request.path)?;

        self.monitor.state.voices_created.fetch_add(1, Ordering::SeqCst);
        self.monitor.state.live_voices.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            "Headless voice for {} ({}, {:?})",
            request.path.display(),
            request.mode,
            length
        );

        Ok(Box::new(HeadlessVoice {
            length,
            mode: request.mode,
            params: request.params,
            spatial: request.spatial,
            bus: request.bus,
            clock: VoiceClock::default(),
            monitor: self.monitor.clone(),
        }))
    }

    fn create_bus(&mut self) -> AudioResult<Arc<dyn Bus>> {
        Ok(Arc::new(SharedGain::default()))
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master = clamp_volume(volume);
    }

    fn master_volume(&self) -> f32 {
        self.master
    }

    fn set_listener(&mut self, listener: Listener) {
        self.listener = listener;
    }

    fn listener(&self) -> Listener {
        self.listener
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        let live = self.monitor.live_voices();
        if live > 0 {
            self.monitor
                .state
                .unclean_teardowns
                .fetch_add(1, Ordering::SeqCst);
            tracing::error!("Headless engine dropped with {} live voices", live);
        }
        self.monitor.state.engines_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Playback position bookkeeping; position advances at `pitch` x real time
#[derive(Debug, Default)]
struct VoiceClock {
    running_since: Option<Instant>,
    /// Media time accumulated before the last pitch change
    consumed: Duration,
    stopped: bool,
}

struct HeadlessVoice {
    length: Duration,
    mode: LoadMode,
    params: PlaybackParams,
    spatial: Option<SpatialParams>,
    bus: Option<Arc<dyn Bus>>,
    clock: VoiceClock,
    monitor: HeadlessMonitor,
}

impl HeadlessVoice {
    fn position(&self) -> Duration {
        match self.clock.running_since {
            Some(since) => self.clock.consumed + since.elapsed().mul_f32(self.params.pitch),
            None => self.clock.consumed,
        }
    }
}

impl Voice for HeadlessVoice {
    fn start(&mut self) {
        if self.clock.running_since.is_none() && !self.clock.stopped {
            self.clock.running_since = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.clock.stopped = true;
    }

    fn is_playing(&self) -> bool {
        if self.clock.stopped || self.clock.running_since.is_none() {
            return false;
        }
        self.params.looping || self.position() < self.length
    }

    fn set_volume(&mut self, volume: f32) {
        self.params.volume = clamp_volume(volume);
    }

    fn set_pitch(&mut self, pitch: f32) {
        let pitch = clamp_pitch(pitch);
        if self.clock.running_since.is_some() {
            self.clock.consumed = self.position();
            self.clock.running_since = Some(Instant::now());
        }
        self.params.pitch = pitch;
    }

    fn set_looping(&mut self, looping: bool) {
        self.params.looping = looping;
    }

    fn set_spatial(&mut self, spatial: Option<SpatialParams>) {
        self.spatial = spatial;
    }
}

impl Drop for HeadlessVoice {
    fn drop(&mut self) {
        self.monitor.state.live_voices.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(
            "Headless {} voice dropped (bus gain {:?}, spatial {})",
            self.mode,
            self.bus.as_ref().map(|bus| bus.volume()),
            self.spatial.is_some()
        );
    }
}

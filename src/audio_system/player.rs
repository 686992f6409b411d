/// rodio-backed engine
///
/// The output stream is not `Send`, so it lives on a keeper thread for the
/// lifetime of the engine; only its handle crosses over. Each voice is one
/// `Sink` fed by a loop-toggleable source and a stereo gain stage that reads
/// master, bus and spatial gains from shared cells.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::engine::{AudioEngine, Bus, SharedGain, Voice, VoiceRequest};
use super::source::LoadMode;
use crate::error::{AudioError, AudioResult};
use crate::spatial::{Listener, SpatialParams, StereoGains};
use crate::utils::{clamp_pitch, clamp_volume};

/// How often a playing voice re-reads its gains
const CONTROL_PERIOD: Duration = Duration::from_millis(5);

type FileDecoder = Decoder<BufReader<File>>;

fn open_decoder(path: &Path) -> AudioResult<FileDecoder> {
    let file = File::open(path).map_err(|e| AudioError::file_load(path, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| AudioError::file_load(path, e))
}

struct StreamKeeper {
    stop_tx: Sender<()>,
    thread: thread::JoinHandle<()>,
}

pub struct RodioEngine {
    handle: OutputStreamHandle,
    master: Arc<SharedGain>,
    listener: Arc<RwLock<Listener>>,
    keeper: Option<StreamKeeper>,
}

impl RodioEngine {
    /// Open the default output device
    pub fn new() -> AudioResult<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<OutputStreamHandle, String>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        // Any message or a disconnect ends the stream
                        let _ = stop_rx.recv();
                    }
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(AudioError::engine)?;

        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(message)) => {
                let _ = thread.join();
                return Err(AudioError::engine(message));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(AudioError::engine("audio output thread exited during startup"));
            }
        };

        tracing::info!("Audio output stream opened");

        Ok(Self {
            handle,
            master: Arc::new(SharedGain::default()),
            listener: Arc::new(RwLock::new(Listener::default())),
            keeper: Some(StreamKeeper { stop_tx, thread }),
        })
    }
}

impl AudioEngine for RodioEngine {
    fn create_voice(&mut self, request: VoiceRequest<'_>) -> AudioResult<Box<dyn Voice>> {
        let path = request.path;
        let decoder = open_decoder(path)?;
        let looping = Arc::new(AtomicBool::new(request.params.looping));

        let source: Box<dyn Source<Item = i16> + Send> = match request.mode {
            LoadMode::Streamed => {
                let owned: PathBuf = path.to_path_buf();
                Box::new(Restartable::new(
                    decoder,
                    move || match open_decoder(&owned) {
                        Ok(decoder) => Some(decoder),
                        Err(e) => {
                            tracing::warn!("Failed to reopen {} for looping: {}", owned.display(), e);
                            None
                        }
                    },
                    Arc::clone(&looping),
                ))
            }
            LoadMode::Buffered => {
                let buffered = decoder.buffered();
                let template = buffered.clone();
                Box::new(Restartable::new(
                    buffered,
                    move || Some(template.clone()),
                    Arc::clone(&looping),
                ))
            }
        };

        let spatial = Arc::new(RwLock::new(request.spatial));
        let controls = GainControls {
            master: Arc::clone(&self.master),
            bus: request.bus,
            listener: Arc::clone(&self.listener),
            spatial: Arc::clone(&spatial),
        };
        let mix = StereoMix::new(source, controls.gains())
            .periodic_access(CONTROL_PERIOD, move |mix| mix.gains = controls.gains());

        let sink = Sink::try_new(&self.handle).map_err(|e| AudioError::file_load(path, e))?;
        sink.pause();
        sink.set_volume(clamp_volume(request.params.volume));
        sink.set_speed(clamp_pitch(request.params.pitch));
        sink.append(mix);

        tracing::debug!("Created {} voice for {}", request.mode, path.display());

        Ok(Box::new(RodioVoice {
            sink,
            looping,
            spatial,
            started: false,
            stopped: false,
        }))
    }

    fn create_bus(&mut self) -> AudioResult<Arc<dyn Bus>> {
        Ok(Arc::new(SharedGain::default()))
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master.set(volume);
    }

    fn master_volume(&self) -> f32 {
        self.master.get()
    }

    fn set_listener(&mut self, listener: Listener) {
        *self.listener.write() = listener;
    }

    fn listener(&self) -> Listener {
        *self.listener.read()
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        if let Some(keeper) = self.keeper.take() {
            let _ = keeper.stop_tx.send(());
            let _ = keeper.thread.join();
            tracing::info!("Audio output stream closed");
        }
    }
}

struct RodioVoice {
    sink: Sink,
    looping: Arc<AtomicBool>,
    spatial: Arc<RwLock<Option<SpatialParams>>>,
    started: bool,
    stopped: bool,
}

impl Voice for RodioVoice {
    fn start(&mut self) {
        if !self.stopped {
            self.started = true;
            self.sink.play();
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.sink.stop();
    }

    fn is_playing(&self) -> bool {
        self.started && !self.stopped && !self.sink.is_paused() && !self.sink.empty()
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(clamp_volume(volume));
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.sink.set_speed(clamp_pitch(pitch));
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    fn set_spatial(&mut self, spatial: Option<SpatialParams>) {
        *self.spatial.write() = spatial;
    }
}

/// Gain inputs read by the audio thread
struct GainControls {
    master: Arc<SharedGain>,
    bus: Option<Arc<dyn Bus>>,
    listener: Arc<RwLock<Listener>>,
    spatial: Arc<RwLock<Option<SpatialParams>>>,
}

impl GainControls {
    fn gains(&self) -> StereoGains {
        let level = self.master.get() * self.bus.as_ref().map_or(1.0, |bus| bus.volume());
        let shaped = match *self.spatial.read() {
            Some(params) => params.stereo_gains(&self.listener.read()),
            None => StereoGains::UNITY,
        };
        shaped.scaled(level)
    }
}

/// Source that starts over from a fresh copy when it runs dry while the
/// shared loop flag is set
struct Restartable<S, F> {
    current: S,
    reopen: F,
    looping: Arc<AtomicBool>,
}

impl<S, F> Restartable<S, F> {
    fn new(current: S, reopen: F, looping: Arc<AtomicBool>) -> Self {
        Self {
            current,
            reopen,
            looping,
        }
    }
}

impl<S, F> Iterator for Restartable<S, F>
where
    S: Source<Item = i16>,
    F: FnMut() -> Option<S>,
{
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if let Some(sample) = self.current.next() {
            return Some(sample);
        }
        if !self.looping.load(Ordering::Relaxed) {
            return None;
        }
        self.current = (self.reopen)()?;
        // An empty file ends here instead of spinning
        self.current.next()
    }
}

impl<S, F> Source for Restartable<S, F>
where
    S: Source<Item = i16>,
    F: FnMut() -> Option<S>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.current.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.current.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.current.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Converts any input to stereo f32 and applies per-channel gains.
/// Channels beyond the first two are dropped.
struct StereoMix<S> {
    input: S,
    gains: StereoGains,
    pending_right: Option<f32>,
}

impl<S> StereoMix<S> {
    fn new(input: S, gains: StereoGains) -> Self {
        Self {
            input,
            gains,
            pending_right: None,
        }
    }
}

fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

impl<S> Iterator for StereoMix<S>
where
    S: Source<Item = i16>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if let Some(right) = self.pending_right.take() {
            return Some(right);
        }

        let channels = self.input.channels().max(1);
        let left = sample_to_f32(self.input.next()?);
        let right = if channels == 1 {
            left
        } else {
            let right = self.input.next().map(sample_to_f32).unwrap_or(left);
            for _ in 2..channels {
                let _ = self.input.next();
            }
            right
        };

        self.pending_right = Some(right * self.gains.right);
        Some(left * self.gains.left)
    }
}

impl<S> Source for StereoMix<S>
where
    S: Source<Item = i16>,
{
    fn current_frame_len(&self) -> Option<usize> {
        let channels = self.input.channels().max(1) as usize;
        self.input
            .current_frame_len()
            .map(|len| len / channels * 2 + usize::from(self.pending_right.is_some()))
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.input.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.input.total_duration()
    }
}

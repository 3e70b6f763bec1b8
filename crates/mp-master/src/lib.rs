//! Headless controller for modplay.
//!
//! Provides a unified API for loading modules, offline rendering, WAV
//! export and realtime playback that the CLI and tests share.

mod wav;

use log::{debug, error, warn};
use mp_audio::{AudioOutput, CpalOutput};
use mp_engine::Engine;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

// Re-export common types so callers don't need mp-ir/mp-engine directly.
pub use mp_engine::{EngineConfig, Frame, SlideMemory, SongPosition};
pub use mp_formats::FormatError;
pub use mp_ir::{Module, ModuleFormat};

pub use wav::{frames_to_wav, write_wav};

/// Frames rendered per block on the playback thread.
const BLOCK_FRAMES: usize = 256;

/// Upper bound on the up-front buffer for offline renders.
const PREALLOC_FRAMES: usize = 1 << 22;

/// Sync codes buffered between drains.
const SYNC_CAPACITY: usize = 256;

/// Error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("wav export failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Headless controller: owns a module and manages playback.
pub struct Controller {
    module: Arc<Module>,
    config: EngineConfig,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    /// Packed order/row/tick, see [`pack_position`]
    position: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    sync_codes: HeapCons<u8>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            module: Arc::new(Module::new("untitled")),
            config,
            playback: None,
        }
    }

    // --- Module management ---

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Settings used by the next render or playback session.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Parse `data` and make it the current module. On failure the
    /// previous module stays loaded.
    pub fn load(&mut self, data: &[u8]) -> Result<(), FormatError> {
        let module = mp_formats::load_module(data)?;
        self.replace(module);
        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        let module = mp_formats::load_module_file(path)?;
        self.replace(module);
        Ok(())
    }

    fn replace(&mut self, module: Module) {
        self.stop();
        debug!(
            "loaded \"{}\": {} channels, {} orders",
            module.title,
            module.channel_count(),
            module.song_length
        );
        self.module = Arc::new(module);
    }

    // --- Real-time playback ---

    /// Start playing the current module on the default audio device.
    pub fn play(&mut self) {
        self.stop();

        let module = self.module.clone();
        let config = self.config;
        let stop_signal = Arc::new(AtomicBool::new(false));
        let position = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (sync_producer, sync_codes) = HeapRb::<u8>::new(SYNC_CAPACITY).split();

        let shared = Shared {
            stop: stop_signal.clone(),
            position: position.clone(),
            finished: finished.clone(),
            sync: sync_producer,
        };
        let thread = std::thread::spawn(move || audio_thread(module, config, shared));

        self.playback = Some(PlaybackHandle {
            stop_signal,
            position,
            finished,
            sync_codes,
            thread: Some(thread),
        });
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    error!("playback thread panicked");
                }
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    /// Current playback position, while playing.
    pub fn position(&self) -> Option<SongPosition> {
        let pb = self.playback.as_ref()?;
        if pb.finished.load(Ordering::Relaxed) {
            return None;
        }
        Some(unpack_position(pb.position.load(Ordering::Relaxed)))
    }

    /// Sync codes forwarded from the playback thread since the last call,
    /// newest first.
    pub fn drain_sync_codes(&mut self) -> Vec<u8> {
        let Some(pb) = self.playback.as_mut() else {
            return Vec::new();
        };
        let mut codes: Vec<u8> = pb.sync_codes.pop_iter().collect();
        codes.reverse();
        codes
    }

    // --- Offline rendering ---

    /// Render from the start of the song until it ends or `max_frames`
    /// frames have been produced.
    pub fn render_frames(&self, max_frames: usize) -> Vec<Frame> {
        let mut engine = Engine::new(self.module.clone(), self.config);
        engine.play();

        let mut frames = Vec::with_capacity(max_frames.min(PREALLOC_FRAMES));
        while frames.len() < max_frames {
            let frame = engine.render_frame();
            if engine.is_finished() {
                break;
            }
            frames.push(frame);
        }
        frames
    }

    /// Render at most `max_seconds` of audio into an in-memory WAV file.
    pub fn render_to_wav(&self, max_seconds: u32) -> Result<Vec<u8>, ControllerError> {
        let frames = self.render_frames(self.max_frames(max_seconds));
        Ok(wav::frames_to_wav(&frames, self.config.sample_rate)?)
    }

    /// Render at most `max_seconds` of audio into a WAV file at `path`,
    /// returning the number of frames written.
    pub fn render_to_wav_file(
        &self,
        path: impl AsRef<Path>,
        max_seconds: u32,
    ) -> Result<usize, ControllerError> {
        let frames = self.render_frames(self.max_frames(max_seconds));
        let file = std::io::BufWriter::new(
            std::fs::File::create(path).map_err(hound::Error::IoError)?,
        );
        wav::write_wav(file, &frames, self.config.sample_rate)?;
        Ok(frames.len())
    }

    fn max_frames(&self, max_seconds: u32) -> usize {
        self.config.sample_rate as usize * max_seconds as usize
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pack_position(pos: SongPosition) -> u64 {
    ((pos.order as u64 & 0xffff_ffff) << 32) | ((pos.row as u64) << 16) | pos.tick as u64
}

fn unpack_position(packed: u64) -> SongPosition {
    SongPosition {
        order: (packed >> 32) as usize,
        row: (packed >> 16) as u16,
        tick: packed as u16,
    }
}

/// State shared with the playback thread.
struct Shared {
    stop: Arc<AtomicBool>,
    position: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    sync: HeapProd<u8>,
}

fn audio_thread(module: Arc<Module>, config: EngineConfig, mut shared: Shared) {
    let (mut output, consumer) = match CpalOutput::new() {
        Ok(pair) => pair,
        Err(err) => {
            error!("cannot open audio output: {err}");
            shared.finished.store(true, Ordering::Relaxed);
            return;
        }
    };

    let config = config.with_sample_rate(output.sample_rate());
    let mut engine = Engine::new(module, config);
    engine.play();

    if let Err(err) = output.build_stream(consumer) {
        error!("cannot start audio stream: {err}");
        shared.finished.store(true, Ordering::Relaxed);
        return;
    }
    if let Err(err) = output.start() {
        warn!("{err}");
    }

    let mut left = [0.0f32; BLOCK_FRAMES];
    let mut right = [0.0f32; BLOCK_FRAMES];
    'render: while !engine.is_finished() && !shared.stop.load(Ordering::Relaxed) {
        engine.render(&mut left, &mut right);
        for (&l, &r) in left.iter().zip(right.iter()) {
            if !output.write_spin(Frame { left: l, right: r }, &shared.stop) {
                break 'render;
            }
        }
        for code in engine.drain_sync_queue().into_iter().rev() {
            if shared.sync.try_push(code).is_err() {
                warn!("sync code {code} dropped, queue full");
            }
        }
        shared
            .position
            .store(pack_position(engine.position()), Ordering::Relaxed);
    }

    // Let the device drain what is queued before closing the stream
    for _ in 0..output.sample_rate() / 10 {
        if !output.write_spin(Frame::silence(), &shared.stop) {
            break;
        }
    }
    if let Err(err) = output.stop() {
        warn!("{err}");
    }
    shared.finished.store(true, Ordering::Relaxed);
}

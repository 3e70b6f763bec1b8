//! Main playback engine.

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::debug;
use mp_ir::{Cell, Module};

use crate::channel::ChannelState;
use crate::config::EngineConfig;
use crate::effects::{s3m, xm, TickContext};
use crate::frame::Frame;
use crate::frequency::Tuning;
use crate::play_state::{PlayState, SongPosition};
use crate::sequencer;
use crate::sync_queue::SyncQueue;
use crate::waveform::Waveforms;

/// The main playback engine.
///
/// Pull-based and single-threaded: every call to [`Engine::render`]
/// advances the song by exactly the number of frames requested.
pub struct Engine {
    /// The module being played
    module: Arc<Module>,
    config: EngineConfig,
    /// Period model for the module's format
    tuning: Tuning,
    waveforms: Waveforms,
    state: PlayState,
    channels: Vec<ChannelState>,
    sync: SyncQueue,
    /// Max-hold output level per channel
    peaks: Vec<f32>,
}

impl Engine {
    /// Create an engine for `module`, prepared and stopped.
    pub fn new(module: Arc<Module>, config: EngineConfig) -> Self {
        let state = PlayState::new(&module, config.repeat);
        let mut engine = Self {
            tuning: Tuning::for_format(module.format),
            module,
            config,
            waveforms: Waveforms::new(),
            state,
            channels: Vec::new(),
            sync: SyncQueue::new(),
            peaks: Vec::new(),
        };
        engine.prepare();
        engine
    }

    /// Replace the module and rewind. Transport flags are kept.
    pub fn load(&mut self, module: Arc<Module>) {
        self.tuning = Tuning::for_format(module.format);
        self.module = module;
        self.prepare();
    }

    /// Reset sequencer, channel state and sync queue to the start of the
    /// song. Transport flags (playing, paused) are kept.
    pub fn prepare(&mut self) {
        let module = &*self.module;
        let playing = self.state.playing;
        let paused = self.state.paused;
        self.state = PlayState::new(module, self.config.repeat);
        self.state.playing = playing;
        self.state.paused = paused;

        self.channels.clear();
        self.channels.extend(
            module
                .channels
                .iter()
                .map(|settings| ChannelState::new(settings.initial_pan)),
        );
        self.peaks.clear();
        self.peaks.resize(self.channels.len(), 0.0);
        self.sync.clear();

        debug!(
            "prepared \"{}\": {} channels, {} orders, speed {} bpm {}",
            module.title,
            self.channels.len(),
            module.song_length,
            self.state.speed,
            self.state.bpm
        );
    }

    pub fn play(&mut self) {
        self.state.playing = true;
        self.state.paused = false;
    }

    pub fn pause(&mut self) {
        self.state.paused = true;
    }

    /// Stop playback and rewind to the start of the song.
    pub fn stop(&mut self) {
        self.state.playing = false;
        self.state.paused = false;
        self.prepare();
    }

    /// Wrap to the restart position instead of ending the song.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.config.repeat = repeat;
        self.state.repeat = repeat;
    }

    /// Sync codes emitted since the last drain, newest first.
    pub fn drain_sync_queue(&mut self) -> Vec<u8> {
        self.sync.drain()
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing && !self.state.paused
    }

    /// Has the end of the order list been reached?
    pub fn is_finished(&self) -> bool {
        self.state.end_of_song
    }

    pub fn position(&self) -> SongPosition {
        self.state.song_position()
    }

    pub fn channel_peaks(&self) -> &[f32] {
        &self.peaks
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    pub fn play_state(&self) -> &PlayState {
        &self.state
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fill `left` and `right` with the next frames of audio.
    ///
    /// Renders `min(left.len(), right.len())` frames. Paused, stopped or
    /// finished playback renders silence and resets the peak meters.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if frames == 0 {
            return;
        }
        if !self.state.is_audible() {
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            self.peaks.fill(0.0);
            return;
        }

        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| {
            self.render_into(&mut left[..frames], &mut right[..frames])
        });
        #[cfg(not(feature = "alloc_check"))]
        self.render_into(&mut left[..frames], &mut right[..frames]);
    }

    fn render_into(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let frame = self.next_frame();
            *l = frame.left;
            *r = frame.right;
        }
    }

    /// Render a single stereo frame.
    pub fn render_frame(&mut self) -> Frame {
        if !self.state.is_audible() {
            self.peaks.fill(0.0);
            return Frame::silence();
        }
        self.next_frame()
    }

    /// Render `count` frames into a new buffer.
    pub fn render_frames(&mut self, count: usize) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.render_frame());
        }
        frames
    }

    fn next_frame(&mut self) -> Frame {
        if self.state.end_of_song {
            return Frame::silence();
        }
        if self.state.tick_countdown <= 0.0 {
            self.process_tick();
            if self.state.end_of_song {
                return Frame::silence();
            }
            self.state.tick_countdown = self.state.samples_per_tick;
        }

        let module = &*self.module;
        let mut out = Frame::silence();
        for (ch, peak) in self.channels.iter_mut().zip(self.peaks.iter_mut()) {
            if !ch.is_sounding() {
                continue;
            }
            let Some(sample) = module.sample(ch.instrument, ch.sample) else {
                continue;
            };
            let (left, right) = ch.mix(sample);
            *peak = peak.max((left + right).abs());
            out.mix(Frame { left, right });
        }

        let divisor = if module.mix_divisor > 0.0 {
            module.mix_divisor
        } else {
            1.0
        };
        out.scale(self.state.global_volume as f32 / 64.0 / divisor);
        self.state.tick_countdown -= 1.0;
        out
    }

    /// Advance the sequencer one tick and run every channel's effects.
    fn process_tick(&mut self) {
        let module = &*self.module;
        sequencer::advance(&mut self.state, module, self.config.sample_rate);
        if self.state.end_of_song {
            return;
        }

        let pattern = module.pattern_at(self.state.position);
        let row = self.state.row as usize;
        let xm = module.format.is_xm();
        let mut ctx = TickContext {
            module,
            config: &self.config,
            waveforms: &self.waveforms,
            tuning: self.tuning,
            state: &mut self.state,
            sync: &mut self.sync,
        };

        for (index, ch) in self.channels.iter_mut().enumerate() {
            let cell = pattern
                .and_then(|p| p.get(row, index))
                .copied()
                .unwrap_or_else(Cell::empty);
            if xm {
                xm::process_channel(&mut ctx, ch, &cell);
            } else {
                s3m::process_channel(&mut ctx, ch, &cell);
            }
        }
        ctx.state.flags.clear_tick();
    }
}

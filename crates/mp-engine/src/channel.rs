//! Channel state for tracker playback.

use mp_ir::{LoopType, Sample};

use crate::frequency::Tuning;

/// Trigger ramp progress per output frame.
const TRIGGER_RAMP_STEP: f32 = 1.0 / 128.0;

/// Volume ramp progress per output frame.
const VOLUME_RAMP_STEP: f32 = 1.0 / 64.0;

/// Fade-out level of a freshly triggered XM note.
pub const FADEOUT_START: i32 = 65535;

/// Playback and effect state for a single tracker channel.
#[derive(Clone, Debug)]
pub struct ChannelState {
    /// Current instrument index (0-based)
    pub instrument: usize,
    /// Sample slot within the instrument
    pub sample: usize,
    /// Last triggered note
    pub note: u8,
    /// Is a note currently held?
    pub note_on: bool,

    /// Fractional read cursor in sample frames
    pub position: f64,
    /// Sample frames advanced per output frame
    pub step: f64,
    /// Playing backwards through a ping-pong loop
    pub reverse: bool,

    // Pitch state
    /// Base period, moved by slides and portamento
    pub period: f64,
    /// Period actually played this tick (base plus vibrato/arpeggio)
    pub voice_period: f64,
    /// Tone portamento target
    pub slide_to: f64,

    // Volume and panning
    /// Volume set by the sample default or the volume column (0-64)
    pub volume: u8,
    /// Working volume changed by effects (0-64)
    pub voice_volume: u8,
    /// Tremolo offset for this tick
    pub volume_offset: i16,
    /// Volume after tremolo, envelope and fade-out (0-64)
    pub final_volume: f32,
    /// Right-side weight (0.0 = left, 1.0 = right)
    pub pan: f32,
    /// Pan after the panning envelope
    pub final_pan: f32,

    // Row data
    pub command: u8,
    pub param: u8,

    // Effect memory
    pub volume_slide: u8,
    pub slide_down: u8,
    pub slide_up: u8,
    pub porta_speed: u8,
    pub extra_fine_up: u8,
    pub extra_fine_down: u8,
    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    /// Vibrato waveform (0=sine, 1=ramp, 2=square, 3=random; bit 2=keep phase)
    pub vibrato_wave: u8,
    pub vibrato_pos: u8,
    pub tremolo_speed: u8,
    pub tremolo_depth: u8,
    /// Tremolo waveform, encoded like `vibrato_wave`
    pub tremolo_wave: u8,
    pub tremolo_pos: u8,
    pub arpeggio: u8,
    pub sample_offset: u8,
    pub retrigger: u8,
    pub pan_slide: u8,

    // Instrument envelopes (XM)
    pub volume_envelope_pos: usize,
    pub pan_envelope_pos: usize,
    /// Fade-out level, 65535 down to 0 after key-off
    pub fadeout: i32,
    /// Keeps sounding after key-off while the volume envelope fades it
    pub fading: bool,

    // Click removal
    /// Last interpolated, trigger-ramped sample value
    pub current_sample: f32,
    pub trigger_ramp: f32,
    pub trigger_ramp_from: f32,
    pub volume_ramp: f32,
    pub volume_ramp_from: f32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl ChannelState {
    /// Create a silent channel with the given initial pan.
    pub fn new(pan: f32) -> Self {
        Self {
            instrument: 0,
            sample: 0,
            note: 0,
            note_on: false,
            position: 0.0,
            step: 0.0,
            reverse: false,
            period: 0.0,
            voice_period: 0.0,
            slide_to: 0.0,
            volume: 64,
            voice_volume: 0,
            volume_offset: 0,
            final_volume: 0.0,
            pan,
            final_pan: pan,
            command: mp_ir::NO_COMMAND,
            param: 0,
            volume_slide: 0,
            slide_down: 0,
            slide_up: 0,
            porta_speed: 0,
            extra_fine_up: 0,
            extra_fine_down: 0,
            vibrato_speed: 0,
            vibrato_depth: 0,
            vibrato_wave: 0,
            vibrato_pos: 0,
            tremolo_speed: 0,
            tremolo_depth: 0,
            tremolo_wave: 0,
            tremolo_pos: 0,
            arpeggio: 0,
            sample_offset: 0,
            retrigger: 0,
            pan_slide: 0,
            volume_envelope_pos: 0,
            pan_envelope_pos: 0,
            fadeout: FADEOUT_START,
            fading: false,
            current_sample: 0.0,
            trigger_ramp: 1.0,
            trigger_ramp_from: 0.0,
            volume_ramp: 1.0,
            volume_ramp_from: 0.0,
        }
    }

    /// Start a click-free crossfade from the current output value.
    pub fn start_trigger_ramp(&mut self) {
        self.trigger_ramp = 0.0;
        self.trigger_ramp_from = self.current_sample;
    }

    /// Restart the sample from frame 0.
    pub fn restart_sample(&mut self) {
        self.position = 0.0;
        self.reverse = false;
        self.start_trigger_ramp();
    }

    /// Trigger `note` at `period` from the start of the sample.
    pub fn trigger(&mut self, note: u8, period: f64) {
        self.note = note;
        self.set_period(period);
        self.restart_sample();
        self.reset_phases();
        self.note_on = true;
    }

    /// Rewind vibrato and tremolo unless their waveform keeps phase.
    pub fn reset_phases(&mut self) {
        if self.vibrato_wave & 4 == 0 {
            self.vibrato_pos = 0;
        }
        if self.tremolo_wave & 4 == 0 {
            self.tremolo_pos = 0;
        }
    }

    /// Reset the XM envelopes and fade-out for a new note.
    pub fn reset_envelopes(&mut self) {
        self.fadeout = FADEOUT_START;
        self.volume_envelope_pos = 0;
        self.pan_envelope_pos = 0;
    }

    /// Set the base period and the played period together.
    pub fn set_period(&mut self, period: f64) {
        self.period = period;
        self.voice_period = period;
    }

    /// Add a signed amount to the voice volume, clamped to 0..=64.
    pub fn slide_volume(&mut self, delta: i16) {
        self.voice_volume = (self.voice_volume as i16 + delta).clamp(0, 64) as u8;
    }

    /// Set both the channel and voice volume.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(64);
        self.voice_volume = self.volume;
    }

    /// Voice volume with this tick's tremolo applied.
    pub fn effective_volume(&self) -> u8 {
        (self.voice_volume as i16 + self.volume_offset).clamp(0, 64) as u8
    }

    /// Clear per-tick modulation before effects run.
    pub fn begin_tick(&mut self) {
        self.voice_period = self.period;
        self.volume_offset = 0;
    }

    /// Recompute the resampling step and arm the volume ramp if the
    /// final volume changed during this tick.
    pub fn end_tick(&mut self, previous_volume: f32, tuning: Tuning, sample_rate: u32) {
        if self.voice_period > 0.0 {
            self.step = tuning.step(self.voice_period, sample_rate);
        }
        if self.final_volume != previous_volume {
            self.volume_ramp_from = previous_volume;
            self.volume_ramp = 0.0;
        }
    }

    /// Does this channel contribute to the mix?
    pub fn is_sounding(&self) -> bool {
        self.note_on || self.fading || self.volume_ramp < 1.0
    }

    /// Render one output frame and advance the read cursor.
    pub fn mix(&mut self, sample: &Sample) -> (f32, f32) {
        let mut left = 0.0;
        let mut right = 0.0;

        if self.position >= 0.0 && (self.position as usize) < sample.len() {
            let raw = sample.interpolated(self.position);

            let t = self.trigger_ramp;
            let value = t * raw + (1.0 - t) * self.trigger_ramp_from;
            self.trigger_ramp = (t + TRIGGER_RAMP_STEP).min(1.0);
            self.current_sample = value;

            let v = self.volume_ramp;
            let target = value * (self.final_volume / 64.0);
            let out = v * target + (1.0 - v) * value * (self.volume_ramp_from / 64.0);
            self.volume_ramp = (v + VOLUME_RAMP_STEP).min(1.0);

            right = out * self.final_pan;
            left = out * (1.0 - self.final_pan);
        } else {
            self.current_sample = 0.0;
        }

        self.advance_cursor(sample);
        (left, right)
    }

    fn advance_cursor(&mut self, sample: &Sample) {
        if self.reverse {
            self.position -= self.step;
        } else {
            self.position += self.step;
        }

        if !sample.has_loop() {
            if self.position >= sample.len() as f64 {
                self.note_on = false;
            }
            return;
        }

        let start = sample.loop_start as f64;
        let end = sample.loop_end as f64;
        match sample.loop_type {
            LoopType::Forward => {
                if self.position >= end {
                    self.position = start + (self.position - start) % (end - start);
                }
            }
            LoopType::PingPong => {
                // Reflected positions stay strictly inside the loop
                let last = (end - 1.0).max(start);
                if !self.reverse && self.position >= end {
                    self.position = (2.0 * end - self.position).clamp(start, last);
                    self.reverse = true;
                } else if self.reverse && self.position <= start {
                    self.position = (2.0 * start - self.position).clamp(start, last);
                    self.reverse = false;
                }
            }
            LoopType::None => {}
        }
    }
}

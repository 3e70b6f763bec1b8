//! Effect processing shared by both formats.
//!
//! Each format module dispatches its command set with a `match` over a
//! command enum: one arm set for the first tick of a row, another for
//! every later tick.

pub mod s3m;
pub mod xm;

use mp_ir::Module;

use crate::channel::ChannelState;
use crate::config::EngineConfig;
use crate::frequency::Tuning;
use crate::play_state::PlayState;
use crate::sync_queue::SyncQueue;
use crate::waveform::{retrigger_volume, Waveforms};

/// Everything an effect may read or change besides its own channel.
pub struct TickContext<'a> {
    pub module: &'a Module,
    pub config: &'a EngineConfig,
    pub waveforms: &'a Waveforms,
    pub tuning: Tuning,
    pub state: &'a mut PlayState,
    pub sync: &'a mut SyncQueue,
}

/// Split a parameter into (high, low) nibbles.
pub(crate) fn nibbles(param: u8) -> (u8, u8) {
    (param >> 4, param & 0x0f)
}

/// Decode a BCD row number as used by pattern break.
pub(crate) fn bcd_row(param: u8) -> u16 {
    let (hi, lo) = nibbles(param);
    hi as u16 * 10 + lo as u16
}

/// Per-tick volume slide: `x0` slides up, `0y` slides down, anything
/// else is ignored.
pub(crate) fn volume_slide(ch: &mut ChannelState, param: u8) {
    let (hi, lo) = nibbles(param);
    if lo == 0 {
        ch.slide_volume(hi as i16);
    } else if hi == 0 {
        ch.slide_volume(-(lo as i16));
    }
}

/// Move the base period toward the portamento target by `speed`.
pub(crate) fn tone_portamento(ch: &mut ChannelState, speed: f64) {
    if ch.slide_to <= 0.0 {
        return;
    }
    if ch.period < ch.slide_to {
        ch.period = (ch.period + speed).min(ch.slide_to);
    } else if ch.period > ch.slide_to {
        ch.period = (ch.period - speed).max(ch.slide_to);
    }
    ch.voice_period = ch.period;
}

/// Restart the sample every `param & 0x0f` ticks, adjusting the volume
/// by the retrigger table entry in the high nibble.
pub(crate) fn retrigger(ch: &mut ChannelState, param: u8, tick: u16) -> bool {
    let (hi, interval) = nibbles(param);
    if interval == 0 || tick % interval as u16 != 0 {
        return false;
    }
    ch.restart_sample();
    ch.voice_volume = retrigger_volume(ch.voice_volume, hi);
    true
}

/// Slide the base period by `delta`, switching the note off when the
/// result leaves the tuning's period range.
pub(crate) fn slide_period(ch: &mut ChannelState, delta: f64, tuning: Tuning) {
    let (min, max) = tuning.bounds();
    let next = ch.period + delta;
    if next < min || next > max {
        ch.note_on = false;
    }
    ch.set_period(next.clamp(min, max));
}

/// Tremolo volume offset for a waveform value and depth.
pub(crate) fn tremolo_offset(wave: f32, depth: u8) -> i16 {
    (wave * depth as f32 / 32.0) as i16
}

/// Replace the memory slot with `param` when it is nonzero, then return
/// the remembered value.
pub(crate) fn remember(slot: &mut u8, param: u8) -> u8 {
    if param != 0 {
        *slot = param;
    }
    *slot
}

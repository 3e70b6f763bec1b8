//! Instrument and envelope types.

use alloc::vec::Vec;
use arrayvec::{ArrayString, ArrayVec};

use crate::sample::Sample;

/// Number of pre-expanded envelope ticks.
pub const ENVELOPE_TICKS: usize = 325;

/// Notes covered by an instrument's sample map.
pub const SAMPLE_MAP_NOTES: usize = 96;

/// An instrument: one or more samples plus the XM playback extras.
///
/// S3M instruments are single-sample wrappers with disabled envelopes.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<28>,
    /// Samples owned by this instrument
    pub samples: Vec<Sample>,
    /// Sample mapping: note (0-95) -> index into `samples`
    pub sample_map: [u8; SAMPLE_MAP_NOTES],
    /// Volume envelope
    pub volume_envelope: Envelope,
    /// Panning envelope
    pub panning_envelope: Envelope,
    /// Fadeout speed (0 = no fade)
    pub fadeout: u16,
    /// Instrument vibrato (parsed, not applied during playback)
    pub vibrato: AutoVibrato,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            samples: Vec::new(),
            sample_map: [0; SAMPLE_MAP_NOTES],
            volume_envelope: Envelope::disabled(1.0),
            panning_envelope: Envelope::disabled(0.5),
            fadeout: 0,
            vibrato: AutoVibrato::default(),
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Wrap one sample as an instrument, the way S3M stores them.
    pub fn single(sample: Sample) -> Self {
        let mut inst = Self::new(sample.name.as_str());
        inst.samples.push(sample);
        inst
    }

    /// Sample played for `note`, if the map points at a real sample.
    pub fn sample_for_note(&self, note: u8) -> Option<(usize, &Sample)> {
        let slot = *self.sample_map.get(note as usize)? as usize;
        self.samples.get(slot).map(|s| (slot, s))
    }
}

/// Instrument vibrato parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoVibrato {
    /// Waveform type (0=sine, 1=square, 2=ramp down, 3=ramp up)
    pub waveform: u8,
    /// Sweep (ramp-up time in ticks)
    pub sweep: u8,
    pub depth: u8,
    pub rate: u8,
}

/// A point in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopePoint {
    /// Tick position
    pub tick: u16,
    /// Value (0-64)
    pub value: u16,
}

/// A volume or panning envelope, pre-sampled per tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Stored envelope points
    pub points: ArrayVec<EnvelopePoint, 12>,
    /// Is the envelope enabled?
    pub enabled: bool,
    /// Sustain tick, held while the note is on
    pub sustain: Option<usize>,
    /// Loop (start tick, end tick)
    pub loop_range: Option<(usize, usize)>,
    /// Tick of the final point; the cursor never moves beyond it
    pub length: usize,
    /// Dense per-tick values in 0.0..=1.0
    pub values: Vec<f32>,
}

impl Envelope {
    /// A disabled envelope that always reads `value`.
    pub fn disabled(value: f32) -> Self {
        Self {
            points: ArrayVec::new(),
            enabled: false,
            sustain: None,
            loop_range: None,
            length: 0,
            values: alloc::vec![value; ENVELOPE_TICKS],
        }
    }

    /// Build an enabled envelope from its points, expanding it to
    /// `ENVELOPE_TICKS` values. Sustain and loop are point indices.
    pub fn from_points(
        points: &[EnvelopePoint],
        sustain_point: Option<usize>,
        loop_points: Option<(usize, usize)>,
    ) -> Self {
        let points: ArrayVec<EnvelopePoint, 12> = points.iter().copied().take(12).collect();
        let tick_of = |idx: usize| points.get(idx).map(|p| p.tick as usize).unwrap_or(0);

        let mut values = alloc::vec![0.0f32; ENVELOPE_TICKS];
        if let Some(first) = points.first() {
            let mut seg = 0;
            for (tick, out) in values.iter_mut().enumerate() {
                while seg + 1 < points.len() && tick >= points[seg + 1].tick as usize {
                    seg += 1;
                }
                let a = points[seg];
                let v = match points.get(seg + 1) {
                    Some(b) if tick >= a.tick as usize && b.tick > a.tick => {
                        let t = (tick - a.tick as usize) as f32 / (b.tick - a.tick) as f32;
                        a.value as f32 + (b.value as f32 - a.value as f32) * t
                    }
                    Some(_) if (tick as u16) < first.tick => first.value as f32,
                    _ => a.value as f32,
                };
                *out = v / 64.0;
            }
        }

        Self {
            length: points.last().map(|p| p.tick as usize).unwrap_or(0),
            sustain: sustain_point.map(tick_of),
            loop_range: loop_points.map(|(s, e)| (tick_of(s), tick_of(e))),
            points,
            enabled: true,
            values,
        }
    }

    /// Value at an envelope tick, holding the last value past the end.
    pub fn value(&self, tick: usize) -> f32 {
        let idx = tick.min(ENVELOPE_TICKS - 1);
        self.values.get(idx).copied().unwrap_or(0.0)
    }

    /// Step a cursor one tick forward, honouring sustain and loop.
    pub fn advance(&self, pos: usize, note_on: bool) -> usize {
        let mut pos = pos + 1;
        if let Some(sustain) = self.sustain {
            if note_on && pos >= sustain {
                pos = sustain;
            }
        }
        if let Some((start, end)) = self.loop_range {
            if pos >= end {
                pos = start;
            }
        }
        pos.min(self.length).min(ENVELOPE_TICKS - 1)
    }
}

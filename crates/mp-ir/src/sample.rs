//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// A sample definition with PCM data normalized to `-1.0..1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<28>,
    /// Mono PCM data
    pub data: Vec<f32>,
    /// Loop start position (in sample frames)
    pub loop_start: usize,
    /// Loop end position (exclusive, in sample frames)
    pub loop_end: usize,
    /// Loop type
    pub loop_type: LoopType,
    /// Default volume (0-64)
    pub volume: u8,
    /// Default panning (0-255), XM only
    pub panning: Option<u8>,
    /// Pitch reference
    pub pitch: SamplePitch,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: Vec::new(),
            loop_start: 0,
            loop_end: 0,
            loop_type: LoopType::None,
            volume: 64,
            panning: None,
            pitch: SamplePitch::C2Speed(8363),
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the sample has a usable loop.
    pub fn has_loop(&self) -> bool {
        self.loop_type != LoopType::None && self.loop_end > self.loop_start
    }

    /// Loop length in frames (0 without a loop).
    pub fn loop_len(&self) -> usize {
        self.loop_end.saturating_sub(self.loop_start)
    }

    /// Clamp loop points into the sample data, dropping a loop that collapses.
    pub fn clamp_loop(&mut self) {
        let len = self.data.len();
        self.loop_end = self.loop_end.min(len);
        self.loop_start = self.loop_start.min(self.loop_end);
        if self.loop_end <= self.loop_start {
            self.loop_type = LoopType::None;
        }
    }

    /// Read one frame, zero outside the data.
    pub fn frame(&self, index: usize) -> f32 {
        self.data.get(index).copied().unwrap_or(0.0)
    }

    /// Index of the frame that follows `index` during playback.
    ///
    /// Forward loops wrap to the loop start; everything else runs on
    /// (and reads as silence past the end).
    pub fn next_index(&self, index: usize) -> usize {
        let next = index + 1;
        if self.loop_type == LoopType::Forward && self.has_loop() && next >= self.loop_end {
            self.loop_start
        } else if self.loop_type == LoopType::PingPong && self.has_loop() && next >= self.loop_end {
            index
        } else {
            next
        }
    }

    /// Linearly interpolated value at a fractional position.
    pub fn interpolated(&self, pos: f64) -> f32 {
        if pos < 0.0 {
            return 0.0;
        }
        let index = pos as usize;
        let frac = (pos - index as f64) as f32;
        let a = self.frame(index);
        let b = self.frame(self.next_index(index));
        a + (b - a) * frac
    }
}

/// Sample loop type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// No loop
    #[default]
    None,
    /// Forward loop
    Forward,
    /// Ping-pong (bidirectional) loop
    PingPong,
}

/// How a sample's base pitch is expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplePitch {
    /// Playback rate at C-4 in Hz (S3M)
    C2Speed(u32),
    /// Semitone offset and finetune (-128..127) relative to C-4 at 8363 Hz (XM)
    Relative { relative_note: i8, finetune: i8 },
}

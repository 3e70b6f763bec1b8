//! Audio frame type.

/// A stereo audio frame with samples nominally in `-1.0..1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
        }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        self.left += other.left;
        self.right += other.right;
    }

    /// Scale both channels by `gain`.
    pub fn scale(&mut self, gain: f32) {
        self.left *= gain;
        self.right *= gain;
    }

    /// Convert to clamped 16-bit PCM.
    pub fn to_i16(self) -> [i16; 2] {
        [to_pcm16(self.left), to_pcm16(self.right)]
    }
}

fn to_pcm16(value: f32) -> i16 {
    (value * 32767.0).clamp(-32768.0, 32767.0) as i16
}

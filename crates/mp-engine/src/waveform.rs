//! Vibrato/tremolo waveform tables and the retrigger volume table.

/// Phase steps in one S3M waveform period.
pub const S3M_WAVE_LEN: usize = 256;

/// Phase steps in one XM waveform period.
pub const XM_WAVE_LEN: usize = 64;

/// Retrigger volume change, indexed by the parameter's high nibble.
///
/// Entries 6, 7, 14 and 15 are multipliers, the rest are added.
pub const RETRIGGER_VOLUME: [f32; 16] = [
    0.0, -1.0, -2.0, -4.0, -8.0, -16.0, 2.0 / 3.0, 0.5, //
    0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 1.5, 2.0,
];

/// Apply one retrigger volume step, clamped to 0..=64.
pub fn retrigger_volume(volume: u8, nibble: u8) -> u8 {
    let nibble = (nibble & 0x0f) as usize;
    let factor = RETRIGGER_VOLUME[nibble];
    let next = if nibble & 7 >= 6 {
        libm::floorf(volume as f32 * factor)
    } else {
        volume as f32 + factor
    };
    next.clamp(0.0, 64.0) as u8
}

/// Sine, ramp-down, square and random tables for both formats.
///
/// Built once per engine and shared by every channel.
#[derive(Clone, Debug)]
pub struct Waveforms {
    s3m: [[f32; S3M_WAVE_LEN]; 4],
    xm: [[f32; XM_WAVE_LEN]; 4],
}

impl Waveforms {
    pub fn new() -> Self {
        let mut rng = Lcg::new(0x5eed_1234);
        let mut s3m = [[0.0; S3M_WAVE_LEN]; 4];
        for (i, slot) in s3m[0].iter_mut().enumerate() {
            *slot = 127.0 * sine(i, S3M_WAVE_LEN);
        }
        for (i, slot) in s3m[1].iter_mut().enumerate() {
            *slot = 127.0 - i as f32;
        }
        for (i, slot) in s3m[2].iter_mut().enumerate() {
            *slot = if i < S3M_WAVE_LEN / 2 { 127.0 } else { -128.0 };
        }
        for slot in s3m[3].iter_mut() {
            *slot = rng.next_unit() * 255.0 - 128.0;
        }

        let mut xm = [[0.0; XM_WAVE_LEN]; 4];
        for (i, slot) in xm[0].iter_mut().enumerate() {
            *slot = 127.0 * sine(i, XM_WAVE_LEN);
        }
        for (i, slot) in xm[1].iter_mut().enumerate() {
            *slot = 127.0 - 4.0 * i as f32;
        }
        for (i, slot) in xm[2].iter_mut().enumerate() {
            *slot = if i < XM_WAVE_LEN / 2 { 127.0 } else { -127.0 };
        }
        for slot in xm[3].iter_mut() {
            *slot = rng.next_unit() * 255.0 - 128.0;
        }

        Self { s3m, xm }
    }

    /// S3M table value; the low two bits of `wave` pick the shape.
    pub fn s3m(&self, wave: u8, phase: u8) -> f32 {
        self.s3m[(wave & 3) as usize][phase as usize]
    }

    /// XM table value; `phase` wraps at 64.
    pub fn xm(&self, wave: u8, phase: u8) -> f32 {
        self.xm[(wave & 3) as usize][phase as usize % XM_WAVE_LEN]
    }
}

impl Default for Waveforms {
    fn default() -> Self {
        Self::new()
    }
}

fn sine(i: usize, len: usize) -> f32 {
    libm::sinf(core::f32::consts::TAU * i as f32 / len as f32)
}

/// Fixed-seed generator so the random waveform is reproducible.
struct Lcg(u32);

impl Lcg {
    fn new(seed: u32) -> Self {
        Self(seed)
    }

    fn next_unit(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 8) as f32 / (1u32 << 24) as f32
    }
}

//! Period tables and period-to-frequency conversion.
//!
//! Both formats express pitch as a period (higher = lower pitch). S3M
//! scales an Amiga-style table by the sample's C-4 speed; XM uses either
//! a linear period space or finetuned Amiga periods.

use mp_ir::{ModuleFormat, SamplePitch};

/// Lowest S3M / XM Amiga period (highest pitch).
pub const AMIGA_PERIOD_MIN: f64 = 56.0;

/// Highest S3M / XM Amiga period (lowest pitch).
pub const AMIGA_PERIOD_MAX: f64 = 27392.0;

/// Lowest XM linear period.
pub const LINEAR_PERIOD_MIN: f64 = 1.0;

/// Highest XM linear period.
pub const LINEAR_PERIOD_MAX: f64 = 7680.0;

/// Amiga clock used for S3M periods.
const S3M_CLOCK: f64 = 14_317_056.0;

/// C-4 speed every S3M period is relative to.
const S3M_C4_SPEED: f64 = 8363.0;

/// XM playback rate at the C-4 period.
const XM_C4_FREQUENCY: f64 = 8287.137;

/// Nine octaves of S3M periods for C2SPD 8363.
const S3M_PERIODS: [u16; 108] = [
    27392, 25856, 24384, 23040, 21696, 20480, 19328, 18240, 17216, 16256, 15360, 14496, //
    13696, 12928, 12192, 11520, 10848, 10240, 9664, 9120, 8608, 8128, 7680, 7248, //
    6848, 6464, 6096, 5760, 5424, 5120, 4832, 4560, 4304, 4064, 3840, 3624, //
    3424, 3232, 3048, 2880, 2712, 2560, 2416, 2280, 2152, 2032, 1920, 1812, //
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 906, //
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, //
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, //
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, //
    107, 101, 95, 90, 85, 80, 75, 71, 67, 63, 60, 56,
];

/// Finetuned Amiga periods, eight finetune steps per semitone from B-3
/// to B-4, plus the closing C-5.
const XM_AMIGA_PERIODS: [u16; 105] = [
    907, 900, 894, 887, 881, 875, 868, 862, //
    856, 850, 844, 838, 832, 826, 820, 814, //
    808, 802, 796, 791, 785, 779, 774, 768, //
    762, 757, 752, 746, 741, 736, 730, 725, //
    720, 715, 709, 704, 699, 694, 689, 684, //
    678, 675, 670, 665, 660, 655, 651, 646, //
    640, 636, 632, 628, 623, 619, 614, 610, //
    604, 601, 597, 592, 588, 584, 580, 575, //
    570, 567, 563, 559, 555, 551, 547, 543, //
    538, 535, 532, 528, 524, 520, 516, 513, //
    508, 505, 502, 498, 494, 491, 487, 484, //
    480, 477, 474, 470, 467, 463, 460, 457, //
    453, 450, 447, 445, 442, 439, 436, 433, //
    428,
];

/// Period space a module plays in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tuning {
    S3m,
    XmLinear,
    XmAmiga,
}

impl Tuning {
    pub fn for_format(format: ModuleFormat) -> Self {
        match format {
            ModuleFormat::S3m { .. } => Tuning::S3m,
            ModuleFormat::Xm {
                linear_periods: true,
            } => Tuning::XmLinear,
            ModuleFormat::Xm {
                linear_periods: false,
            } => Tuning::XmAmiga,
        }
    }

    /// Inclusive (min, max) period range.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Tuning::XmLinear => (LINEAR_PERIOD_MIN, LINEAR_PERIOD_MAX),
            Tuning::S3m | Tuning::XmAmiga => (AMIGA_PERIOD_MIN, AMIGA_PERIOD_MAX),
        }
    }

    pub fn clamp(self, period: f64) -> f64 {
        let (min, max) = self.bounds();
        period.clamp(min, max)
    }

    /// Playback frequency in Hz for a period.
    pub fn frequency(self, period: f64) -> f64 {
        if period <= 0.0 {
            return 0.0;
        }
        match self {
            Tuning::S3m => S3M_CLOCK / period,
            Tuning::XmLinear => XM_C4_FREQUENCY * libm::pow(2.0, (4608.0 - period) / 768.0),
            Tuning::XmAmiga => XM_C4_FREQUENCY * 1712.0 / period,
        }
    }

    /// Sample frames to advance per output frame.
    pub fn step(self, period: f64, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.frequency(period) / sample_rate as f64
    }

    /// Period of `note` played on a sample with the given pitch reference.
    ///
    /// Returns `None` when the sample cannot sound (C2SPD of zero).
    pub fn note_period(self, note: u8, pitch: SamplePitch) -> Option<f64> {
        match (self, pitch) {
            (Tuning::S3m, SamplePitch::C2Speed(c2spd)) => s3m_period(note, c2spd),
            (Tuning::S3m, SamplePitch::Relative { relative_note, .. }) => {
                s3m_period(offset_note(note, relative_note), S3M_C4_SPEED as u32)
            }
            (_, SamplePitch::Relative {
                relative_note,
                finetune,
            }) => Some(self.xm_period(offset_note(note, relative_note), finetune)),
            (_, SamplePitch::C2Speed(_)) => Some(self.xm_period(note, 0)),
        }
    }

    fn xm_period(self, note: u8, finetune: i8) -> f64 {
        match self {
            Tuning::XmAmiga => xm_amiga_period(note, finetune),
            _ => xm_linear_period(note, finetune),
        }
    }
}

fn offset_note(note: u8, relative: i8) -> u8 {
    (note as i16 + relative as i16).clamp(0, 118) as u8
}

/// S3M period for a note (octave * 12 + semitone) at a given C2SPD.
pub fn s3m_period(note: u8, c2spd: u32) -> Option<f64> {
    if c2spd == 0 {
        return None;
    }
    let base = S3M_PERIODS[(note as usize).min(S3M_PERIODS.len() - 1)] as f64;
    Some(S3M_C4_SPEED * base / c2spd as f64)
}

/// XM linear period: 64 units per semitone, finetune in half units.
pub fn xm_linear_period(note: u8, finetune: i8) -> f64 {
    7680.0 - note as f64 * 64.0 - finetune as f64 / 2.0
}

/// XM Amiga period, interpolated between finetune steps.
pub fn xm_amiga_period(note: u8, finetune: i8) -> f64 {
    let fine = finetune as f64 / 16.0;
    let step = libm::floor(fine);
    let frac = fine - step;
    let base = 8 + (note as i32 % 12) * 8 + step as i32;
    let p1 = amiga_entry(base);
    let p2 = amiga_entry(base + 1);
    let octave = (note / 12) as i32;
    ((1.0 - frac) * p1 + frac * p2) * 32.0 / libm::pow(2.0, octave as f64)
}

fn amiga_entry(index: i32) -> f64 {
    let index = index.clamp(0, XM_AMIGA_PERIODS.len() as i32 - 1) as usize;
    XM_AMIGA_PERIODS[index] as f64
}

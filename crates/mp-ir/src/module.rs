//! The parsed module: song structure, patterns and instruments.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::Pattern;
use crate::sample::Sample;

/// An entry in the order list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEntry {
    /// Play pattern with this index
    Pattern(u8),
    /// Skip marker (+++), continue to next
    Skip,
    /// End of song marker (---)
    End,
}

impl OrderEntry {
    /// Decode an S3M-style order byte (254 = skip, 255 = end).
    pub const fn from_byte(b: u8) -> Self {
        match b {
            254 => OrderEntry::Skip,
            255 => OrderEntry::End,
            p => OrderEntry::Pattern(p),
        }
    }
}

/// Format family and the flags that change playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleFormat {
    /// Scream Tracker 3
    S3m {
        /// ST3.00 volume slides also run on tick 0
        fast_volume_slides: bool,
    },
    /// FastTracker 2
    Xm {
        /// Linear frequency table (false = amiga periods)
        linear_periods: bool,
    },
}

impl ModuleFormat {
    pub fn is_xm(&self) -> bool {
        matches!(self, ModuleFormat::Xm { .. })
    }
}

/// Per-channel settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelSettings {
    /// Initial panning as the right-side weight (0.0 = left, 1.0 = right)
    pub initial_pan: f32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self { initial_pan: 0.5 }
    }
}

/// An immutable, fully decoded module.
#[derive(Clone, Debug)]
pub struct Module {
    /// Song title
    pub title: ArrayString<32>,
    pub format: ModuleFormat,
    /// One entry per playing channel
    pub channels: Vec<ChannelSettings>,
    /// Order list, including skip and end markers
    pub order: Vec<OrderEntry>,
    /// Number of playable order entries
    pub song_length: usize,
    /// XM restart position
    pub restart_position: usize,
    pub patterns: Vec<Pattern>,
    pub instruments: Vec<Instrument>,
    /// Initial ticks per row
    pub initial_speed: u8,
    /// Initial tempo (BPM)
    pub initial_tempo: u8,
    /// Initial global volume (0-64)
    pub global_volume: u8,
    /// Master mix divisor applied to the summed output
    pub mix_divisor: f32,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            format: ModuleFormat::S3m {
                fast_volume_slides: false,
            },
            channels: Vec::new(),
            order: Vec::new(),
            song_length: 0,
            restart_position: 0,
            patterns: Vec::new(),
            instruments: Vec::new(),
            initial_speed: 6,
            initial_tempo: 125,
            global_volume: 64,
            mix_divisor: 1.0,
        }
    }
}

impl Module {
    /// Create a new empty module.
    pub fn new(title: &str) -> Self {
        let mut module = Self::default();
        let _ = module.title.try_push_str(title);
        module
    }

    /// Number of playing channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Pattern referenced by the order entry at `position`.
    pub fn pattern_at(&self, position: usize) -> Option<&Pattern> {
        match self.order.get(position)? {
            OrderEntry::Pattern(p) => self.patterns.get(*p as usize),
            _ => None,
        }
    }

    /// Row count for the pattern at `position` (64 when unresolvable).
    pub fn rows_at(&self, position: usize) -> u16 {
        self.pattern_at(position).map(|p| p.rows).unwrap_or(64)
    }

    /// Look up a sample by instrument index and sample slot.
    pub fn sample(&self, instrument: usize, slot: usize) -> Option<&Sample> {
        self.instruments.get(instrument)?.samples.get(slot)
    }

    /// Total number of samples across all instruments.
    pub fn sample_count(&self) -> usize {
        self.instruments.iter().map(|i| i.samples.len()).sum()
    }
}

//! Engine configuration.

/// How the S3M pitch slide commands (`E`, `F`, `G`) remember their
/// last nonzero parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlideMemory {
    /// Each command keeps its own memory slot.
    #[default]
    Independent,
    /// All three share one slot, as Scream Tracker itself does.
    Shared,
}

/// Playback settings chosen by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Wrap to the restart position instead of ending the song
    pub repeat: bool,
    /// Slide memory model for S3M pitch slides
    pub slide_memory: SlideMemory,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            repeat: false,
            slide_memory: SlideMemory::Independent,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_slide_memory(mut self, slide_memory: SlideMemory) -> Self {
        self.slide_memory = slide_memory;
        self
    }
}

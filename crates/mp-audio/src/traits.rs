//! Audio output trait and error types.

use mp_engine::Frame;

/// Error type for audio operations.
#[derive(Debug)]
pub enum AudioError {
    /// Failed to initialize audio device
    DeviceInit(String),
    /// Failed to create audio stream
    StreamCreate(String),
    /// Playback error
    Playback(String),
    /// No audio device available
    NoDevice,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::DeviceInit(msg) => write!(f, "device init error: {msg}"),
            AudioError::StreamCreate(msg) => write!(f, "stream create error: {msg}"),
            AudioError::Playback(msg) => write!(f, "playback error: {msg}"),
            AudioError::NoDevice => write!(f, "no audio output device available"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Device sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Queue frames for playback, dropping any that do not fit.
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}

//! Realtime audio output for the modplay engine.
//!
//! The engine renders [`Frame`](mp_engine::Frame)s on a producer thread;
//! the device callback pulls them from a lock-free ring buffer.

mod cpal_backend;
mod traits;

pub use cpal_backend::{CpalOutput, FrameConsumer};
pub use traits::{AudioError, AudioOutput};

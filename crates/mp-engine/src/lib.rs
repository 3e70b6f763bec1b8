//! Playback engine for S3M and XM tracker modules.
//!
//! [`Engine`] owns the per-session state: the sequencer position, one
//! [`ChannelState`] per pattern channel and the sync-code queue. The host
//! pulls audio with [`Engine::render`]; ticks are processed on demand as
//! the frame countdown runs out.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod config;
pub mod effects;
mod frame;
pub mod frequency;
mod mixer;
mod play_state;
pub mod sequencer;
mod sync_queue;
mod waveform;

pub use channel::{ChannelState, FADEOUT_START};
pub use config::{EngineConfig, SlideMemory};
pub use frame::Frame;
pub use frequency::{s3m_period, xm_amiga_period, xm_linear_period, Tuning};
pub use mixer::Engine;
pub use play_state::{ControlFlags, PlayState, SongPosition};
pub use sync_queue::SyncQueue;
pub use waveform::{retrigger_volume, Waveforms, RETRIGGER_VOLUME};

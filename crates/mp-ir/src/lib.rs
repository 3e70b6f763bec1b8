//! Core data model for modplay.
//!
//! This crate defines the representation every format loader emits and
//! the playback engine consumes: a module is an order list of patterns
//! of cells, plus instruments holding normalized sample data.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod instrument;
mod module;
mod pattern;
mod sample;

pub use effects::{VolumeCommand, NO_COMMAND, NO_VOLUME};
pub use instrument::{
    AutoVibrato, Envelope, EnvelopePoint, Instrument, ENVELOPE_TICKS, SAMPLE_MAP_NOTES,
};
pub use module::{ChannelSettings, Module, ModuleFormat, OrderEntry};
pub use pattern::{Cell, Note, Pattern, NOTE_LIMIT};
pub use sample::{LoopType, Sample, SamplePitch};

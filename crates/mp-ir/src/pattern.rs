//! Pattern and cell types for tracker sequences.

use alloc::vec::Vec;
use crate::effects::{VolumeCommand, NO_COMMAND};

/// Highest note number (exclusive) a cell can hold.
pub const NOTE_LIMIT: u8 = 119;

/// A note value in a pattern cell.
///
/// The raw byte encoding shared by both formats is 0-118 for a pitch,
/// 254 for note-off and 255 for "no note".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No note
    #[default]
    None,
    /// Note on (0 = C-0, 12 semitones per octave)
    On(u8),
    /// Note off / key release
    Off,
}

impl Note {
    pub const RAW_OFF: u8 = 254;
    pub const RAW_NONE: u8 = 255;

    /// Decode the unified raw byte. Out-of-range pitches decode as `None`.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            Self::RAW_OFF => Note::Off,
            n if n < NOTE_LIMIT => Note::On(n),
            _ => Note::None,
        }
    }

    /// Encode back to the unified raw byte.
    pub const fn raw(self) -> u8 {
        match self {
            Note::None => Self::RAW_NONE,
            Note::On(n) => n,
            Note::Off => Self::RAW_OFF,
        }
    }

    /// Create a note from octave and semitone (0-11).
    pub const fn from_octave_semitone(octave: u8, semitone: u8) -> Self {
        Note::from_raw(octave * 12 + semitone)
    }

    /// Get the octave if this is a note on.
    pub const fn octave(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n / 12),
            _ => None,
        }
    }

    /// Get the semitone (0-11) if this is a note on.
    pub const fn semitone(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n % 12),
            _ => None,
        }
    }
}

/// A single cell in a pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Note value
    pub note: Note,
    /// Instrument number (0 = none, 1-255 = instrument index + 1)
    pub instrument: u8,
    /// Volume column command
    pub volume: VolumeCommand,
    /// Effect command id (format specific, `NO_COMMAND` = none)
    pub command: u8,
    /// Effect parameter, nibbles interpreted per command
    pub param: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            note: Note::None,
            instrument: 0,
            volume: VolumeCommand::None,
            command: NO_COMMAND,
            param: 0,
        }
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        self.note == Note::None
            && self.instrument == 0
            && self.volume == VolumeCommand::None
            && self.command == NO_COMMAND
    }

    /// Returns true if the effect column holds a command.
    pub fn has_command(&self) -> bool {
        self.command != NO_COMMAND
    }
}

/// A pattern containing rows of cells across channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    /// Number of rows (64 for S3M, 1-256 for XM)
    pub rows: u16,
    /// Number of channels
    pub channels: u8,
    /// Pattern data, stored row-major: data[row * channels + channel]
    pub data: Vec<Cell>,
}

impl Pattern {
    /// Create a new pattern with empty cells.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Cell::empty(); rows as usize * channels as usize],
        }
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: u16, channel: u8) -> &Cell {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Cell {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &mut self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Bounds-checked cell lookup.
    pub fn get(&self, row: usize, channel: usize) -> Option<&Cell> {
        if row >= self.rows as usize || channel >= self.channels as usize {
            return None;
        }
        self.data.get(row * self.channels as usize + channel)
    }

    /// Iterate over all cells in a row.
    pub fn row(&self, row: u16) -> &[Cell] {
        let start = row as usize * self.channels as usize;
        &self.data[start..start + self.channels as usize]
    }

    /// Copy of this pattern keeping only the first `channels` columns.
    pub fn truncated(&self, channels: u8) -> Pattern {
        let keep = channels.min(self.channels);
        let mut out = Pattern::new(self.rows, keep);
        for row in 0..self.rows {
            for ch in 0..keep {
                *out.cell_mut(row, ch) = *self.cell(row, ch);
            }
        }
        out
    }
}

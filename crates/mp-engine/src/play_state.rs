//! Global playback state shared by the sequencer and effect processors.

use mp_ir::Module;

/// Row-boundary requests and per-tick notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlFlags {
    /// The sequencer moved to a new row on this tick
    pub new_row: bool,
    /// The sequencer moved to a new order position on this tick
    pub new_pattern: bool,
    /// A pattern break or position jump is pending
    pub pattern_jump: bool,
    /// A pattern loop back to `loop_row` is pending
    pub pattern_loop: bool,
}

impl ControlFlags {
    /// Clear the per-tick notifications, keeping pending requests.
    pub fn clear_tick(&mut self) {
        self.new_row = false;
        self.new_pattern = false;
    }
}

/// Where playback currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SongPosition {
    /// Index into the order list
    pub order: usize,
    pub row: u16,
    pub tick: u16,
}

/// Sequencer and transport state for one playback session.
#[derive(Clone, Debug)]
pub struct PlayState {
    /// Order list index
    pub position: usize,
    pub row: u16,
    pub tick: u16,
    /// Ticks per row
    pub speed: u8,
    /// Tempo in BPM
    pub bpm: u8,
    /// Global volume (0-64)
    pub global_volume: u8,
    /// Global volume slide memory (XM `H`)
    pub global_slide: u8,

    /// Target order index of a pending break/jump
    pub jump_position: usize,
    /// Target row of a pending break/jump
    pub break_row: u16,
    /// Row marked by the last loop-start command
    pub loop_row: u16,
    /// Remaining loop repetitions
    pub loop_count: u8,
    /// Extra rows to hold the current row for
    pub pattern_delay: u8,
    /// Rows of the current delay already held
    pub pattern_wait: u8,
    pub flags: ControlFlags,

    /// Output frames per tick at the current tempo
    pub samples_per_tick: f64,
    /// Frames left until the next tick
    pub tick_countdown: f64,

    pub playing: bool,
    pub paused: bool,
    pub repeat: bool,
    pub end_of_song: bool,
    /// No tick has been processed since `prepare`
    pub fresh: bool,
}

impl PlayState {
    /// Initial state for `module`, positioned before row 0.
    pub fn new(module: &Module, repeat: bool) -> Self {
        Self {
            position: 0,
            row: 0,
            tick: 0,
            speed: module.initial_speed.max(1),
            bpm: module.initial_tempo.max(1),
            global_volume: module.global_volume.min(64),
            global_slide: 0,
            jump_position: 0,
            break_row: 0,
            loop_row: 0,
            loop_count: 0,
            pattern_delay: 0,
            pattern_wait: 0,
            flags: ControlFlags::default(),
            samples_per_tick: 0.0,
            tick_countdown: 0.0,
            playing: false,
            paused: false,
            repeat,
            end_of_song: false,
            fresh: true,
        }
    }

    pub fn song_position(&self) -> SongPosition {
        SongPosition {
            order: self.position,
            row: self.row,
            tick: self.tick,
        }
    }

    /// True while `render` should produce sound.
    pub fn is_audible(&self) -> bool {
        self.playing && !self.paused && !self.end_of_song
    }

    /// Request a pattern break to `row` of the next order entry, unless
    /// a jump on this row already chose the target position.
    pub fn request_break(&mut self, row: u16) {
        self.break_row = row;
        if !self.flags.pattern_jump {
            self.jump_position = self.position + 1;
        }
        self.flags.pattern_jump = true;
    }

    /// Request a jump to row 0 of order entry `position`.
    pub fn request_jump(&mut self, position: usize) {
        self.break_row = 0;
        self.jump_position = position;
        self.flags.pattern_jump = true;
    }

    /// Pattern loop command: `count` 0 marks the loop start, otherwise
    /// counts down and requests a loop while repetitions remain.
    pub fn pattern_loop(&mut self, count: u8) {
        if count == 0 {
            self.loop_row = self.row;
            return;
        }
        if self.loop_count != 0 {
            self.loop_count -= 1;
        } else {
            self.loop_count = count;
        }
        if self.loop_count != 0 {
            self.flags.pattern_loop = true;
        }
    }

    /// Pattern delay command.
    pub fn delay_pattern(&mut self, rows: u8) {
        self.pattern_delay = rows;
        self.pattern_wait = 0;
    }

    /// Slide the global volume with a nibble-coded parameter.
    pub fn slide_global_volume(&mut self, param: u8) {
        let hi = param >> 4;
        let lo = param & 0x0f;
        if lo == 0 {
            self.global_volume = (self.global_volume + hi).min(64);
        } else if hi == 0 {
            self.global_volume = self.global_volume.saturating_sub(lo);
        }
    }
}

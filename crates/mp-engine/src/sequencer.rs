//! Tick/row/order sequencing.
//!
//! One call to [`advance`] moves playback forward by a tick, resolving
//! pattern delay, loop, break and jump requests at row boundaries.

use log::trace;
use mp_ir::{Module, ModuleFormat, OrderEntry};

use crate::play_state::PlayState;

/// Output frames per tick: `rate * 2.5 / bpm`, truncated for XM.
pub fn samples_per_tick(format: ModuleFormat, sample_rate: u32, bpm: u8) -> f64 {
    let exact = sample_rate as f64 * 2.5 / bpm.max(1) as f64;
    if format.is_xm() {
        libm::floor(exact)
    } else {
        exact
    }
}

/// Advance playback by one tick.
pub fn advance(state: &mut PlayState, module: &Module, sample_rate: u32) {
    state.samples_per_tick = samples_per_tick(module.format, sample_rate, state.bpm);

    if state.fresh {
        state.fresh = false;
        state.tick = 0;
        state.flags.new_row = true;
        state.flags.new_pattern = true;
        settle_position(state, module);
        return;
    }

    state.tick += 1;
    let speed = state.speed.max(1) as u16;
    if state.tick >= speed {
        if state.pattern_delay != 0 {
            if state.tick < (state.pattern_delay as u16 + 1) * speed {
                state.pattern_wait = state.pattern_wait.saturating_add(1);
            } else {
                state.pattern_delay = 0;
                state.pattern_wait = 0;
                next_row(state);
            }
        } else {
            next_row(state);
        }
    }

    if state.row >= module.rows_at(state.position) {
        state.position += 1;
        state.row = 0;
        state.flags.new_pattern = true;
    }

    if state.flags.new_pattern {
        settle_position(state, module);
    }
}

/// Resolve pending loop/jump requests or step to the next row.
fn next_row(state: &mut PlayState) {
    if state.flags.pattern_loop {
        trace!("pattern loop back to row {}", state.loop_row);
        state.row = state.loop_row;
        state.flags.pattern_loop = false;
        state.flags.pattern_jump = false;
    } else if state.flags.pattern_jump {
        trace!(
            "jump from order {} to order {} row {}",
            state.position,
            state.jump_position,
            state.break_row
        );
        state.position = state.jump_position;
        state.row = state.break_row;
        state.jump_position = 0;
        state.break_row = 0;
        state.flags.pattern_jump = false;
        state.flags.new_pattern = true;
    } else {
        state.row += 1;
    }
    state.tick = 0;
    state.flags.new_row = true;
}

/// Skip marker entries and handle the end of the order list.
fn settle_position(state: &mut PlayState, module: &Module) {
    skip_markers(state, module);
    if !at_end(state, module) {
        return;
    }
    if state.repeat {
        let restart = if module.restart_position < module.song_length {
            module.restart_position
        } else {
            0
        };
        trace!("end of order list, wrapping to order {restart}");
        state.position = restart;
        skip_markers(state, module);
        if !at_end(state, module) {
            return;
        }
    }
    trace!("end of song at order {}", state.position);
    state.end_of_song = true;
}

fn skip_markers(state: &mut PlayState, module: &Module) {
    while module.order.get(state.position) == Some(&OrderEntry::Skip) {
        state.position += 1;
    }
}

fn at_end(state: &PlayState, module: &Module) -> bool {
    state.position >= module.song_length
        || !matches!(
            module.order.get(state.position),
            Some(OrderEntry::Pattern(_))
        )
}

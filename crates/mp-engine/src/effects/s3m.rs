//! Scream Tracker 3 note and effect processing.

use mp_ir::{Cell, ModuleFormat, Note};

use super::{
    bcd_row, nibbles, remember, retrigger, slide_period, tone_portamento, tremolo_offset,
    volume_slide, TickContext,
};
use crate::channel::ChannelState;
use crate::config::SlideMemory;

/// S3M effect letters, `A` = 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum S3mCommand {
    SetSpeed = 1,
    PositionJump,
    PatternBreak,
    VolumeSlide,
    SlideDown,
    SlideUp,
    TonePortamento,
    Vibrato,
    Tremor,
    Arpeggio,
    VibratoVolumeSlide,
    PortamentoVolumeSlide,
    ChannelVolume,
    ChannelVolumeSlide,
    SampleOffset,
    PanSlide,
    Retrigger,
    Tremolo,
    Special,
    Tempo,
    FineVibrato,
    GlobalVolume,
    GlobalVolumeSlide,
    SetPan,
    Panbrello,
    Sync,
}

impl S3mCommand {
    pub fn from_raw(raw: u8) -> Option<Self> {
        use S3mCommand::*;
        Some(match raw {
            1 => SetSpeed,
            2 => PositionJump,
            3 => PatternBreak,
            4 => VolumeSlide,
            5 => SlideDown,
            6 => SlideUp,
            7 => TonePortamento,
            8 => Vibrato,
            9 => Tremor,
            10 => Arpeggio,
            11 => VibratoVolumeSlide,
            12 => PortamentoVolumeSlide,
            13 => ChannelVolume,
            14 => ChannelVolumeSlide,
            15 => SampleOffset,
            16 => PanSlide,
            17 => Retrigger,
            18 => Tremolo,
            19 => Special,
            20 => Tempo,
            21 => FineVibrato,
            22 => GlobalVolume,
            23 => GlobalVolumeSlide,
            24 => SetPan,
            25 => Panbrello,
            26 => Sync,
            _ => return None,
        })
    }
}

/// Run one tick of S3M processing for a channel.
pub(crate) fn process_channel(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell) {
    let previous = ch.final_volume;
    ch.begin_tick();

    if ctx.state.flags.new_row {
        ch.command = cell.command;
        ch.param = cell.param;
        if !is_note_delay(ch) {
            process_note(ctx, ch, cell);
        }
    }

    let empty = ctx
        .module
        .sample(ch.instrument, ch.sample)
        .map_or(true, |s| s.is_empty());
    if empty {
        ch.note_on = false;
    }

    if let Some(command) = S3mCommand::from_raw(ch.command) {
        if ctx.state.tick == 0 {
            first_tick(ctx, ch, cell, command);
        } else {
            later_tick(ctx, ch, cell, command);
        }
    }

    ch.vibrato_pos = ch.vibrato_pos.wrapping_add(ch.vibrato_speed.wrapping_mul(2));
    ch.tremolo_pos = ch.tremolo_pos.wrapping_add(ch.tremolo_speed.wrapping_mul(2));

    ch.final_volume = ch.effective_volume() as f32;
    ch.final_pan = ch.pan;
    ch.end_tick(previous, ctx.tuning, ctx.config.sample_rate);
}

fn is_note_delay(ch: &ChannelState) -> bool {
    ch.command == S3mCommand::Special as u8 && ch.param >> 4 == 0xd
}

fn is_portamento(command: u8) -> bool {
    command == S3mCommand::TonePortamento as u8
        || command == S3mCommand::PortamentoVolumeSlide as u8
}

/// Apply the note, instrument and volume columns of a row.
fn process_note(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell) {
    let module = ctx.module;
    if cell.instrument != 0 {
        let index = cell.instrument as usize - 1;
        if let Some(sample) = module.sample(index, 0) {
            ch.instrument = index;
            ch.sample = 0;
            ch.set_volume(sample.volume);
            if cell.note == Note::None && ch.position > sample.len() as f64 {
                ch.restart_sample();
            }
        }
    }

    match cell.note {
        Note::On(note) => {
            let period = module
                .sample(ch.instrument, ch.sample)
                .and_then(|s| ctx.tuning.note_period(note, s.pitch));
            if let Some(period) = period {
                if !is_portamento(ch.command) {
                    ch.trigger(note, period);
                }
                ch.slide_to = period;
            }
        }
        Note::Off => {
            ch.note_on = false;
            ch.voice_volume = 0;
        }
        Note::None => {}
    }

    if let Some(volume) = cell.volume.set_volume() {
        ch.set_volume(volume);
    }
}

/// Memory slot used by `E`, `F` and `G`.
fn slide_slot(ch: &mut ChannelState, memory: SlideMemory, command: S3mCommand) -> &mut u8 {
    match (memory, command) {
        (SlideMemory::Shared, _) => &mut ch.slide_down,
        (_, S3mCommand::SlideUp) => &mut ch.slide_up,
        (_, S3mCommand::TonePortamento | S3mCommand::PortamentoVolumeSlide) => {
            &mut ch.porta_speed
        }
        _ => &mut ch.slide_down,
    }
}

fn fast_volume_slides(ctx: &TickContext) -> bool {
    matches!(
        ctx.module.format,
        ModuleFormat::S3m {
            fast_volume_slides: true
        }
    )
}

fn first_tick(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell, command: S3mCommand) {
    let param = ch.param;
    match command {
        S3mCommand::SetSpeed => {
            if param > 0 {
                ctx.state.speed = param;
            }
        }
        S3mCommand::PositionJump => ctx.state.request_jump(param as usize),
        S3mCommand::PatternBreak => ctx.state.request_break(bcd_row(param)),
        S3mCommand::VolumeSlide
        | S3mCommand::VibratoVolumeSlide
        | S3mCommand::PortamentoVolumeSlide => first_volume_slide(ctx, ch),
        S3mCommand::SlideDown | S3mCommand::SlideUp => {
            let speed = remember(slide_slot(ch, ctx.config.slide_memory, command), param);
            let (hi, lo) = nibbles(speed);
            let delta = match hi {
                0xf => lo as f64 * 4.0,
                0xe => lo as f64,
                _ => return,
            };
            let delta = if command == S3mCommand::SlideUp {
                -delta
            } else {
                delta
            };
            slide_period(ch, delta, ctx.tuning);
        }
        S3mCommand::TonePortamento => {
            remember(slide_slot(ch, ctx.config.slide_memory, command), param);
        }
        S3mCommand::Vibrato | S3mCommand::FineVibrato => set_vibrato(ch, param),
        S3mCommand::Arpeggio => {
            remember(&mut ch.arpeggio, param);
        }
        S3mCommand::SampleOffset => {
            let offset = remember(&mut ch.sample_offset, param) as f64 * 256.0;
            let length = ctx
                .module
                .sample(ch.instrument, ch.sample)
                .map_or(0, |s| s.len());
            if offset < length as f64 {
                ch.position = offset;
                ch.start_trigger_ramp();
            }
        }
        S3mCommand::Retrigger => {
            let param = remember(&mut ch.retrigger, param);
            retrigger(ch, param, ctx.state.tick);
        }
        S3mCommand::Tremolo => {
            let (speed, depth) = nibbles(param);
            if speed != 0 {
                ch.tremolo_speed = speed;
            }
            if depth != 0 {
                ch.tremolo_depth = depth;
            }
        }
        S3mCommand::Special => special(ctx, ch, cell),
        S3mCommand::Tempo => {
            if param > 32 {
                ctx.state.bpm = param;
            }
        }
        S3mCommand::GlobalVolume => ctx.state.global_volume = param.min(64),
        S3mCommand::Sync => ctx.sync.push(param),
        S3mCommand::Tremor
        | S3mCommand::ChannelVolume
        | S3mCommand::ChannelVolumeSlide
        | S3mCommand::PanSlide
        | S3mCommand::GlobalVolumeSlide
        | S3mCommand::SetPan
        | S3mCommand::Panbrello => {}
    }
}

fn later_tick(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell, command: S3mCommand) {
    match command {
        S3mCommand::VolumeSlide => volume_slide(ch, ch.volume_slide),
        S3mCommand::SlideDown | S3mCommand::SlideUp => {
            let speed = *slide_slot(ch, ctx.config.slide_memory, command);
            if speed < 0xe0 {
                let delta = speed as f64 * 4.0;
                let delta = if command == S3mCommand::SlideUp {
                    -delta
                } else {
                    delta
                };
                slide_period(ch, delta, ctx.tuning);
            }
        }
        S3mCommand::TonePortamento => portamento(ctx, ch),
        S3mCommand::Vibrato => vibrato(ctx, ch, 128.0),
        S3mCommand::FineVibrato => vibrato(ctx, ch, 512.0),
        S3mCommand::Arpeggio => arpeggio(ctx, ch),
        S3mCommand::VibratoVolumeSlide => {
            vibrato(ctx, ch, 128.0);
            volume_slide(ch, ch.volume_slide);
        }
        S3mCommand::PortamentoVolumeSlide => {
            portamento(ctx, ch);
            volume_slide(ch, ch.volume_slide);
        }
        S3mCommand::Retrigger => {
            retrigger(ch, ch.retrigger, ctx.state.tick);
        }
        S3mCommand::Tremolo => {
            let wave = ctx.waveforms.s3m(ch.tremolo_wave, ch.tremolo_pos);
            ch.volume_offset = tremolo_offset(wave, ch.tremolo_depth);
        }
        S3mCommand::Special => special(ctx, ch, cell),
        _ => {}
    }
}

/// `Dxy` on the first tick: `DxF` fine up, `DFy` fine down, otherwise a
/// normal slide only in fast-slide songs.
fn first_volume_slide(ctx: &TickContext, ch: &mut ChannelState) {
    let param = remember(&mut ch.volume_slide, ch.param);
    let (hi, lo) = nibbles(param);
    if lo == 0xf && hi != 0 {
        ch.slide_volume(hi as i16);
    } else if hi == 0xf && lo != 0 {
        ch.slide_volume(-(lo as i16));
    } else if fast_volume_slides(ctx) {
        volume_slide(ch, param);
    }
}

fn set_vibrato(ch: &mut ChannelState, param: u8) {
    let (speed, depth) = nibbles(param);
    if speed != 0 && depth != 0 {
        ch.vibrato_speed = speed;
        ch.vibrato_depth = depth;
    }
}

fn vibrato(ctx: &TickContext, ch: &mut ChannelState, divisor: f64) {
    let wave = ctx.waveforms.s3m(ch.vibrato_wave, ch.vibrato_pos) as f64;
    ch.voice_period = ctx
        .tuning
        .clamp(ch.period + wave * ch.vibrato_depth as f64 / divisor);
}

fn portamento(ctx: &TickContext, ch: &mut ChannelState) {
    let speed = *slide_slot(ch, ctx.config.slide_memory, S3mCommand::TonePortamento);
    tone_portamento(ch, speed as f64 * 4.0);
}

fn arpeggio(ctx: &TickContext, ch: &mut ChannelState) {
    let (hi, lo) = nibbles(ch.arpeggio);
    let offset = match ctx.state.tick & 3 {
        1 => hi,
        2 => lo,
        _ => 0,
    };
    if offset == 0 {
        return;
    }
    let period = ctx
        .module
        .sample(ch.instrument, ch.sample)
        .and_then(|s| ctx.tuning.note_period(ch.note.saturating_add(offset), s.pitch));
    if let Some(period) = period {
        ch.voice_period = period;
    }
}

/// `Sxy` sub-commands. Runs on every tick; most only act on tick 0.
fn special(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell) {
    let (sub, x) = nibbles(ch.param);
    let tick = ctx.state.tick;
    match sub {
        0x2 if tick == 0 => ctx.sync.push(x),
        0x3 if tick == 0 => ch.vibrato_wave = x & 7,
        0x4 if tick == 0 => ch.tremolo_wave = x & 7,
        0x8 if tick == 0 => ch.pan = x as f32 / 15.0,
        0xb if tick == 0 => ctx.state.pattern_loop(x),
        0xc if tick != 0 && tick == x as u16 => {
            ch.volume = 0;
            ch.voice_volume = 0;
        }
        0xd if tick == x as u16 => process_note(ctx, ch, cell),
        0xe if tick == 0 => ctx.state.delay_pattern(x),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::frequency::{s3m_period, Tuning};
    use crate::play_state::PlayState;
    use crate::sync_queue::SyncQueue;
    use crate::waveform::Waveforms;
    use mp_ir::{Instrument, Module, Pattern, Sample, SamplePitch, VolumeCommand};

    const C4: u8 = 48;

    fn cmd(letter: char) -> u8 {
        letter as u8 - b'A' + 1
    }

    struct Harness {
        module: Module,
        config: EngineConfig,
        waveforms: Waveforms,
        state: PlayState,
        sync: SyncQueue,
        ch: ChannelState,
    }

    impl Harness {
        fn new() -> Self {
            let mut module = Module::new("fx");
            module.format = ModuleFormat::S3m {
                fast_volume_slides: false,
            };
            module.patterns.push(Pattern::new(64, 1));
            let mut sample = Sample::new("s");
            sample.data = vec![0.5; 4096];
            sample.volume = 48;
            sample.pitch = SamplePitch::C2Speed(8363);
            module.instruments.push(Instrument::single(sample));
            let state = PlayState::new(&module, false);
            Self {
                module,
                config: EngineConfig::default(),
                waveforms: Waveforms::new(),
                state,
                sync: SyncQueue::new(),
                ch: ChannelState::new(0.5),
            }
        }

        /// Process `cell` for `ticks` ticks starting at tick 0 of a new row.
        fn row(&mut self, cell: Cell, ticks: u16) {
            for tick in 0..ticks {
                self.state.tick = tick;
                self.state.flags.new_row = tick == 0;
                self.step(&cell);
            }
        }

        fn step(&mut self, cell: &Cell) {
            let mut ctx = TickContext {
                module: &self.module,
                config: &self.config,
                waveforms: &self.waveforms,
                tuning: Tuning::S3m,
                state: &mut self.state,
                sync: &mut self.sync,
            };
            process_channel(&mut ctx, &mut self.ch, cell);
        }
    }

    fn cell(note: Note, instrument: u8, command: u8, param: u8) -> Cell {
        Cell {
            note,
            instrument,
            command,
            param,
            ..Cell::empty()
        }
    }

    #[test]
    fn command_ids_map_letters() {
        assert_eq!(S3mCommand::from_raw(1), Some(S3mCommand::SetSpeed));
        assert_eq!(S3mCommand::from_raw(19), Some(S3mCommand::Special));
        assert_eq!(S3mCommand::from_raw(26), Some(S3mCommand::Sync));
        assert_eq!(S3mCommand::from_raw(0), None);
        assert_eq!(S3mCommand::from_raw(27), None);
    }

    #[test]
    fn note_triggers_with_sample_volume() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        assert!(h.ch.note_on);
        assert_eq!(h.ch.voice_volume, 48);
        assert_eq!(h.ch.period, s3m_period(C4, 8363).unwrap());
        assert_eq!(h.ch.final_volume, 48.0);
        assert!(h.ch.step > 0.0);
    }

    #[test]
    fn note_off_silences() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        h.row(cell(Note::Off, 0, 0, 0), 1);
        assert!(!h.ch.note_on);
        assert_eq!(h.ch.voice_volume, 0);
    }

    #[test]
    fn zero_c2spd_never_triggers() {
        let mut h = Harness::new();
        h.module.instruments[0].samples[0].pitch = SamplePitch::C2Speed(0);
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        assert!(!h.ch.note_on);
    }

    #[test]
    fn volume_column_overrides_sample_volume() {
        let mut h = Harness::new();
        let mut c = cell(Note::On(C4), 1, 0, 0);
        c.volume = VolumeCommand::Set(20);
        h.row(c, 1);
        assert_eq!(h.ch.voice_volume, 20);
    }

    #[test]
    fn fine_volume_slides_on_first_tick_only() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        h.row(cell(Note::None, 0, cmd('D'), 0x3f), 6);
        assert_eq!(h.ch.voice_volume, 51);
        h.row(cell(Note::None, 0, cmd('D'), 0xf2), 6);
        assert_eq!(h.ch.voice_volume, 49);
    }

    #[test]
    fn normal_volume_slide_skips_first_tick() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('D'), 0x04), 6);
        assert_eq!(h.ch.voice_volume, 48 - 5 * 4);
    }

    #[test]
    fn fast_slides_include_first_tick() {
        let mut h = Harness::new();
        h.module.format = ModuleFormat::S3m {
            fast_volume_slides: true,
        };
        h.row(cell(Note::On(C4), 1, cmd('D'), 0x04), 6);
        assert_eq!(h.ch.voice_volume, 48 - 6 * 4);
    }

    #[test]
    fn slide_memory_is_reused() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('E'), 0x02), 3);
        let base = s3m_period(C4, 8363).unwrap();
        assert_eq!(h.ch.period, base + 2.0 * 8.0);
        h.row(cell(Note::None, 0, cmd('E'), 0x00), 2);
        assert_eq!(h.ch.period, base + 3.0 * 8.0);
    }

    #[test]
    fn independent_memory_keeps_up_and_down_apart() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('E'), 0x02), 1);
        h.row(cell(Note::None, 0, cmd('F'), 0x00), 2);
        assert_eq!(h.ch.period, s3m_period(C4, 8363).unwrap());
    }

    #[test]
    fn shared_memory_links_slides() {
        let mut h = Harness::new();
        h.config = h.config.with_slide_memory(SlideMemory::Shared);
        h.row(cell(Note::On(C4), 1, cmd('E'), 0x02), 1);
        h.row(cell(Note::None, 0, cmd('F'), 0x00), 2);
        assert_eq!(h.ch.period, s3m_period(C4, 8363).unwrap() - 8.0);
    }

    #[test]
    fn fine_slide_runs_once() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('F'), 0xf3), 6);
        assert_eq!(h.ch.period, s3m_period(C4, 8363).unwrap() - 12.0);
    }

    #[test]
    fn fine_slide_past_bound_clamps_and_stops() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        let (min, _) = Tuning::S3m.bounds();
        h.ch.set_period(min + 2.0);

        h.row(cell(Note::None, 0, cmd('F'), 0xf3), 1);
        assert_eq!(h.ch.period, min);
        assert!(!h.ch.note_on);

        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        let (_, max) = Tuning::S3m.bounds();
        h.ch.set_period(max - 1.0);

        h.row(cell(Note::None, 0, cmd('E'), 0xe2), 1);
        assert_eq!(h.ch.period, max);
        assert!(!h.ch.note_on);
    }

    #[test]
    fn portamento_keeps_playing_sample() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        h.ch.position = 100.0;
        let from = h.ch.period;
        h.row(cell(Note::On(C4 + 12), 0, cmd('G'), 0x10), 3);
        assert!(h.ch.position >= 100.0);
        assert_eq!(h.ch.period, from - 2.0 * 64.0);
        assert_eq!(h.ch.slide_to, s3m_period(C4 + 12, 8363).unwrap());
    }

    #[test]
    fn vibrato_leaves_base_period() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('H'), 0x48), 4);
        let base = s3m_period(C4, 8363).unwrap();
        assert_eq!(h.ch.period, base);
        assert_ne!(h.ch.voice_period, base);
        h.row(cell(Note::None, 0, 0, 0), 1);
        assert_eq!(h.ch.voice_period, base);
    }

    #[test]
    fn arpeggio_cycles_notes() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('J'), 0x47), 3);
        assert_eq!(h.ch.voice_period, s3m_period(C4 + 7, 8363).unwrap());
        assert_eq!(h.ch.period, s3m_period(C4, 8363).unwrap());
    }

    #[test]
    fn sample_offset_within_length() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('O'), 0x08), 1);
        assert_eq!(h.ch.position, 2048.0);
        h.row(cell(Note::On(C4), 1, cmd('O'), 0x20), 1);
        assert_eq!(h.ch.position, 0.0);
    }

    #[test]
    fn retrigger_raises_volume() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, 0, 0), 1);
        h.ch.set_volume(16);
        let mut seen = Vec::new();
        let c = cell(Note::None, 0, cmd('Q'), 0xe2);
        for tick in 0..6 {
            h.state.tick = tick;
            h.state.flags.new_row = tick == 0;
            h.step(&c);
            seen.push(h.ch.voice_volume);
        }
        assert_eq!(seen, vec![24, 24, 36, 36, 54, 54]);
    }

    #[test]
    fn note_cut_at_tick() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('S'), 0xc2), 2);
        assert_eq!(h.ch.voice_volume, 48);
        h.state.tick = 2;
        h.state.flags.new_row = false;
        h.step(&cell(Note::On(C4), 1, cmd('S'), 0xc2));
        assert_eq!(h.ch.voice_volume, 0);
    }

    #[test]
    fn note_delay_triggers_late() {
        let mut h = Harness::new();
        let c = cell(Note::On(C4), 1, cmd('S'), 0xd2);
        h.row(c, 2);
        assert!(!h.ch.note_on);
        h.state.tick = 2;
        h.state.flags.new_row = false;
        h.step(&c);
        assert!(h.ch.note_on);
    }

    #[test]
    fn global_commands_reach_play_state() {
        let mut h = Harness::new();
        h.row(cell(Note::None, 0, cmd('A'), 4), 1);
        assert_eq!(h.state.speed, 4);
        h.row(cell(Note::None, 0, cmd('T'), 0x20), 1);
        assert_eq!(h.state.bpm, 125);
        h.row(cell(Note::None, 0, cmd('T'), 0x96), 1);
        assert_eq!(h.state.bpm, 150);
        h.row(cell(Note::None, 0, cmd('V'), 0x50), 1);
        assert_eq!(h.state.global_volume, 64);
        h.row(cell(Note::None, 0, cmd('C'), 0x12), 1);
        assert_eq!(h.state.break_row, 12);
        assert!(h.state.flags.pattern_jump);
    }

    #[test]
    fn sync_codes_from_z_and_s2() {
        let mut h = Harness::new();
        h.row(cell(Note::None, 0, cmd('Z'), 0x13), 1);
        h.row(cell(Note::None, 0, cmd('S'), 0x25), 1);
        assert_eq!(h.sync.drain(), vec![5, 3]);
    }

    #[test]
    fn set_pan_sub_command() {
        let mut h = Harness::new();
        h.row(cell(Note::None, 0, cmd('S'), 0x8f), 1);
        assert_eq!(h.ch.final_pan, 1.0);
    }
}

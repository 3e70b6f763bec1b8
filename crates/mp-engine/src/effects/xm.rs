//! FastTracker 2 note, volume-column and effect processing.

use mp_ir::{Cell, Instrument, Note, VolumeCommand, SAMPLE_MAP_NOTES};

use super::{
    bcd_row, nibbles, remember, retrigger, slide_period, tone_portamento, tremolo_offset,
    volume_slide, TickContext,
};
use crate::channel::ChannelState;

/// XM effect ids as stored in the pattern (`0`-`9`, then `A` = 10).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum XmCommand {
    Arpeggio = 0,
    PortamentoUp = 1,
    PortamentoDown = 2,
    TonePortamento = 3,
    Vibrato = 4,
    PortamentoVolumeSlide = 5,
    VibratoVolumeSlide = 6,
    Tremolo = 7,
    SetPan = 8,
    SampleOffset = 9,
    VolumeSlide = 10,
    PositionJump = 11,
    SetVolume = 12,
    PatternBreak = 13,
    Extended = 14,
    SpeedTempo = 15,
    GlobalVolume = 16,
    GlobalVolumeSlide = 17,
    KeyOff = 20,
    EnvelopePosition = 21,
    PanSlide = 25,
    MultiRetrigger = 27,
    Tremor = 29,
    ExtraFinePortamento = 33,
}

impl XmCommand {
    pub fn from_raw(raw: u8) -> Option<Self> {
        use XmCommand::*;
        Some(match raw {
            0 => Arpeggio,
            1 => PortamentoUp,
            2 => PortamentoDown,
            3 => TonePortamento,
            4 => Vibrato,
            5 => PortamentoVolumeSlide,
            6 => VibratoVolumeSlide,
            7 => Tremolo,
            8 => SetPan,
            9 => SampleOffset,
            10 => VolumeSlide,
            11 => PositionJump,
            12 => SetVolume,
            13 => PatternBreak,
            14 => Extended,
            15 => SpeedTempo,
            16 => GlobalVolume,
            17 => GlobalVolumeSlide,
            20 => KeyOff,
            21 => EnvelopePosition,
            25 => PanSlide,
            27 => MultiRetrigger,
            29 => Tremor,
            33 => ExtraFinePortamento,
            _ => return None,
        })
    }
}

/// Run one tick of XM processing for a channel.
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

    let instrument = ctx.module.instruments.get(ch.instrument);
    if instrument.map_or(true, |i| i.samples.is_empty()) {
        ch.note_on = false;
    }

    if ctx.state.tick == 0 {
        first_tick_volume(ctx, ch, cell.volume);
    } else {
        later_tick_volume(ctx, ch, cell.volume);
    }

    if let Some(command) = XmCommand::from_raw(ch.command) {
        if ctx.state.tick == 0 {
            first_tick(ctx, ch, cell, command);
        } else {
            later_tick(ctx, ch, cell, command);
        }
    }

    ch.vibrato_pos = ch.vibrato_pos.wrapping_add(ch.vibrato_speed) & 0x3f;
    ch.tremolo_pos = ch.tremolo_pos.wrapping_add(ch.tremolo_speed) & 0x3f;

    match ctx.module.instruments.get(ch.instrument) {
        Some(instrument) => apply_envelopes(ch, instrument),
        None => {
            ch.final_volume = ch.effective_volume() as f32;
            ch.final_pan = ch.pan;
        }
    }
    ch.end_tick(previous, ctx.tuning, ctx.config.sample_rate);
}

/// Step the envelopes and fade-out, then derive the final volume and pan.
fn apply_envelopes(ch: &mut ChannelState, instrument: &Instrument) {
    let volume_env = &instrument.volume_envelope;
    let pan_env = &instrument.panning_envelope;

    if volume_env.enabled {
        ch.volume_envelope_pos = volume_env.advance(ch.volume_envelope_pos, ch.note_on);
        if !ch.note_on && ch.fadeout > 0 {
            ch.fadeout = (ch.fadeout - instrument.fadeout as i32).max(0);
        }
    }
    if pan_env.enabled {
        ch.pan_envelope_pos = pan_env.advance(ch.pan_envelope_pos, ch.note_on);
    }
    ch.fading = volume_env.enabled && ch.fadeout > 0;

    let envelope = volume_env.value(ch.volume_envelope_pos);
    let fade = ch.fadeout as f32 / 65536.0;
    ch.final_volume = ch.effective_volume() as f32 * envelope * fade;

    let pan = ch.pan;
    let swing = (pan_env.value(ch.pan_envelope_pos) - 0.5) * (0.5 - (pan - 0.5).abs()) * 2.0;
    ch.final_pan = (pan + swing).clamp(0.0, 1.0);
}

fn is_note_delay(ch: &ChannelState) -> bool {
    ch.command == XmCommand::Extended as u8 && ch.param >> 4 == 0xd
}

fn is_portamento(ch: &ChannelState, cell: &Cell) -> bool {
    ch.command == XmCommand::TonePortamento as u8
        || ch.command == XmCommand::PortamentoVolumeSlide as u8
        || matches!(cell.volume, VolumeCommand::TonePorta(_))
}

fn map_key(note: u8) -> u8 {
    note.min(SAMPLE_MAP_NOTES as u8 - 1)
}

fn volume_envelope_enabled(ctx: &TickContext, ch: &ChannelState) -> bool {
    ctx.module
        .instruments
        .get(ch.instrument)
        .map_or(false, |i| i.volume_envelope.enabled)
}

/// Apply the note, instrument and volume columns of a row.
fn process_note(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell) {
    let module = ctx.module;
    if cell.instrument != 0 {
        let index = cell.instrument as usize - 1;
        if let Some(instrument) = module.instruments.get(index) {
            ch.instrument = index;
            let key = match cell.note {
                Note::On(note) => note,
                _ => ch.note,
            };
            if let Some((slot, sample)) = instrument.sample_for_note(map_key(key)) {
                ch.sample = slot;
                ch.volume = sample.volume.min(64);
                ch.reverse = false;
                if let Some(pan) = sample.panning {
                    ch.pan = pan as f32 / 255.0;
                }
            }
            ch.voice_volume = ch.volume;
        }
    }

    match cell.note {
        Note::On(note) => {
            let target = module
                .instruments
                .get(ch.instrument)
                .and_then(|i| i.sample_for_note(map_key(note)))
                .and_then(|(slot, sample)| {
                    ctx.tuning
                        .note_period(note, sample.pitch)
                        .map(|period| (slot, period))
                });
            if let Some((slot, period)) = target {
                ch.sample = slot;
                let porta = is_portamento(ch, cell);
                if ch.note_on {
                    if !porta {
                        ch.trigger(note, period);
                        ch.reset_envelopes();
                    }
                } else {
                    if cell.instrument != 0 {
                        ch.restart_sample();
                        ch.reset_phases();
                        ch.reset_envelopes();
                        ch.note_on = true;
                    }
                    if !porta {
                        ch.note = note;
                        ch.set_period(period);
                    }
                }
                ch.slide_to = period;
            }
        }
        Note::Off => {
            ch.note_on = false;
            if !volume_envelope_enabled(ctx, ch) {
                ch.voice_volume = 0;
            }
        }
        Note::None => {}
    }

    if let Some(volume) = cell.volume.set_volume() {
        ch.set_volume(volume);
    }
}

fn slide_pan(ch: &mut ChannelState, delta: f32) {
    ch.pan = (ch.pan + delta).clamp(0.0, 1.0);
}

fn first_tick_volume(ctx: &TickContext, ch: &mut ChannelState, volume: VolumeCommand) {
    match volume {
        VolumeCommand::FineSlideDown(x) => ch.slide_volume(-(x as i16)),
        VolumeCommand::FineSlideUp(x) => ch.slide_volume(x as i16),
        VolumeCommand::VibratoSpeed(x) => ch.vibrato_speed = x,
        VolumeCommand::Vibrato(x) => {
            if x != 0 {
                ch.vibrato_depth = x;
            }
            vibrato(ctx, ch);
        }
        VolumeCommand::SetPan(x) => ch.pan = x as f32 / 15.0,
        VolumeCommand::TonePorta(x) => {
            if x != 0 {
                ch.porta_speed = x << 4;
            }
        }
        _ => {}
    }
}

fn later_tick_volume(ctx: &TickContext, ch: &mut ChannelState, volume: VolumeCommand) {
    match volume {
        VolumeCommand::SlideDown(x) => ch.slide_volume(-(x as i16)),
        VolumeCommand::SlideUp(x) => ch.slide_volume(x as i16),
        VolumeCommand::Vibrato(_) => vibrato(ctx, ch),
        VolumeCommand::PanSlideLeft(x) => slide_pan(ch, -(x as f32) / 255.0),
        VolumeCommand::PanSlideRight(x) => slide_pan(ch, x as f32 / 255.0),
        VolumeCommand::TonePorta(_) => tone_portamento(ch, ch.porta_speed as f64 * 4.0),
        _ => {}
    }
}

fn first_tick(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell, command: XmCommand) {
    let param = ch.param;
    let (hi, lo) = nibbles(param);
    match command {
        XmCommand::Arpeggio => ch.arpeggio = param,
        XmCommand::PortamentoUp => {
            remember(&mut ch.slide_up, param);
        }
        XmCommand::PortamentoDown => {
            remember(&mut ch.slide_down, param);
        }
        XmCommand::TonePortamento => {
            remember(&mut ch.porta_speed, param);
        }
        XmCommand::Vibrato => {
            if hi != 0 && lo != 0 {
                ch.vibrato_speed = hi;
                ch.vibrato_depth = lo;
            }
            vibrato(ctx, ch);
        }
        XmCommand::PortamentoVolumeSlide
        | XmCommand::VibratoVolumeSlide
        | XmCommand::VolumeSlide => {
            remember(&mut ch.volume_slide, param);
        }
        XmCommand::Tremolo => {
            if hi != 0 {
                ch.tremolo_speed = hi;
            }
            if lo != 0 {
                ch.tremolo_depth = lo;
            }
        }
        XmCommand::SetPan => ch.pan = param as f32 / 255.0,
        XmCommand::SampleOffset => {
            ch.position = remember(&mut ch.sample_offset, param) as f64 * 256.0;
            ch.reverse = false;
            ch.start_trigger_ramp();
        }
        XmCommand::PositionJump => ctx.state.request_jump(param as usize),
        XmCommand::SetVolume => ch.voice_volume = param.min(64),
        XmCommand::PatternBreak => ctx.state.request_break(bcd_row(param)),
        XmCommand::Extended => extended(ctx, ch, cell),
        XmCommand::SpeedTempo => {
            if param > 32 {
                ctx.state.bpm = param;
            } else if param != 0 {
                ctx.state.speed = param;
            }
        }
        XmCommand::GlobalVolume => {
            if param <= 64 {
                ctx.state.global_volume = param;
            }
        }
        XmCommand::GlobalVolumeSlide => {
            remember(&mut ctx.state.global_slide, param);
        }
        XmCommand::KeyOff => {
            ch.note_on = false;
            if !volume_envelope_enabled(ctx, ch) {
                ch.voice_volume = 0;
            }
        }
        XmCommand::EnvelopePosition => {
            ch.volume_envelope_pos = param as usize;
            ch.pan_envelope_pos = param as usize;
        }
        XmCommand::PanSlide => {
            remember(&mut ch.pan_slide, param);
        }
        XmCommand::MultiRetrigger => {
            remember(&mut ch.retrigger, param);
        }
        XmCommand::ExtraFinePortamento => {
            let delta = match hi {
                1 => -(remember(&mut ch.extra_fine_up, lo) as f64),
                2 => remember(&mut ch.extra_fine_down, lo) as f64,
                _ => return,
            };
            ch.set_period(ctx.tuning.clamp(ch.period + delta));
        }
        XmCommand::Tremor => {}
    }
}

fn later_tick(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell, command: XmCommand) {
    match command {
        XmCommand::Arpeggio => arpeggio(ctx, ch),
        XmCommand::PortamentoUp => slide_period(ch, -(ch.slide_up as f64) * 4.0, ctx.tuning),
        XmCommand::PortamentoDown => slide_period(ch, ch.slide_down as f64 * 4.0, ctx.tuning),
        XmCommand::TonePortamento => tone_portamento(ch, ch.porta_speed as f64 * 4.0),
        XmCommand::Vibrato => vibrato(ctx, ch),
        XmCommand::PortamentoVolumeSlide => {
            tone_portamento(ch, ch.porta_speed as f64 * 4.0);
            volume_slide(ch, ch.volume_slide);
        }
        XmCommand::VibratoVolumeSlide => {
            vibrato(ctx, ch);
            volume_slide(ch, ch.volume_slide);
        }
        XmCommand::Tremolo => {
            let wave = ctx.waveforms.xm(ch.tremolo_wave, ch.tremolo_pos);
            ch.volume_offset = tremolo_offset(wave, ch.tremolo_depth);
        }
        XmCommand::VolumeSlide => volume_slide(ch, ch.volume_slide),
        XmCommand::Extended => extended(ctx, ch, cell),
        XmCommand::GlobalVolumeSlide => {
            let param = ctx.state.global_slide;
            ctx.state.slide_global_volume(param);
        }
        XmCommand::PanSlide => {
            let (right, left) = nibbles(ch.pan_slide);
            if right != 0 {
                slide_pan(ch, right as f32 / 255.0);
            } else {
                slide_pan(ch, -(left as f32) / 255.0);
            }
        }
        XmCommand::MultiRetrigger => {
            retrigger(ch, ch.retrigger, ctx.state.tick);
        }
        _ => {}
    }
}

fn vibrato(ctx: &TickContext, ch: &mut ChannelState) {
    let wave = ctx.waveforms.xm(ch.vibrato_wave, ch.vibrato_pos) as f64;
    ch.voice_period = ctx
        .tuning
        .clamp(ch.period + wave / 63.0 * ch.vibrato_depth as f64);
}

fn arpeggio(ctx: &TickContext, ch: &mut ChannelState) {
    let (hi, lo) = nibbles(ch.arpeggio);
    let offset = match ctx.state.tick % 3 {
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

/// `Exy` sub-commands. Runs on every tick; most only act on tick 0.
fn extended(ctx: &mut TickContext, ch: &mut ChannelState, cell: &Cell) {
    let (sub, x) = nibbles(ch.param);
    let tick = ctx.state.tick;
    match sub {
        0x1 if tick == 0 => ch.set_period(ctx.tuning.clamp(ch.period - x as f64 * 4.0)),
        0x2 if tick == 0 => ch.set_period(ctx.tuning.clamp(ch.period + x as f64 * 4.0)),
        0x4 if tick == 0 => ch.vibrato_wave = x & 7,
        0x6 if tick == 0 => ctx.state.pattern_loop(x),
        0x7 if tick == 0 => ch.tremolo_wave = x & 7,
        0x8 if tick == 0 => ctx.sync.push(x),
        0x9 if tick != 0 && x != 0 && tick % x as u16 == 0 => {
            ch.restart_sample();
            ch.reset_envelopes();
        }
        0xa if tick == 0 => ch.slide_volume(x as i16),
        0xb if tick == 0 => ch.slide_volume(-(x as i16)),
        0xc if tick != 0 && tick == x as u16 => ch.voice_volume = 0,
        0xd if tick == x as u16 => process_note(ctx, ch, cell),
        0xe if tick == 0 => ctx.state.delay_pattern(x),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::frequency::{xm_linear_period, Tuning};
    use crate::play_state::PlayState;
    use crate::sync_queue::SyncQueue;
    use crate::waveform::Waveforms;
    use mp_ir::{Envelope, EnvelopePoint, Module, ModuleFormat, Pattern, Sample, SamplePitch};

    const C4: u8 = 48;

    fn cmd(c: char) -> u8 {
        match c {
            '0'..='9' => c as u8 - b'0',
            _ => c as u8 - b'A' + 10,
        }
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
            module.format = ModuleFormat::Xm {
                linear_periods: true,
            };
            module.patterns.push(Pattern::new(64, 1));
            let mut sample = Sample::new("s");
            sample.data = vec![0.5; 4096];
            sample.volume = 40;
            sample.panning = Some(255);
            sample.pitch = SamplePitch::Relative {
                relative_note: 0,
                finetune: 0,
            };
            let mut instrument = Instrument::single(sample);
            instrument.fadeout = 0x4000;
            module.instruments.push(instrument);
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
                tuning: Tuning::XmLinear,
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

    fn quiet(note: Note, instrument: u8) -> Cell {
        cell(note, instrument, mp_ir::NO_COMMAND, 0)
    }

    #[test]
    fn command_ids() {
        assert_eq!(XmCommand::from_raw(0), Some(XmCommand::Arpeggio));
        assert_eq!(XmCommand::from_raw(14), Some(XmCommand::Extended));
        assert_eq!(XmCommand::from_raw(33), Some(XmCommand::ExtraFinePortamento));
        assert_eq!(XmCommand::from_raw(18), None);
        assert_eq!(XmCommand::from_raw(mp_ir::NO_COMMAND), None);
    }

    #[test]
    fn instrument_sets_volume_and_pan() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        assert!(h.ch.note_on);
        assert_eq!(h.ch.voice_volume, 40);
        assert_eq!(h.ch.pan, 1.0);
        assert_eq!(h.ch.period, xm_linear_period(C4, 0));
    }

    #[test]
    fn key_off_without_envelope_cuts() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.row(quiet(Note::Off, 0), 1);
        assert!(!h.ch.note_on);
        assert_eq!(h.ch.voice_volume, 0);
        assert!(!h.ch.fading);
    }

    #[test]
    fn key_off_with_envelope_fades_out() {
        let mut h = Harness::new();
        let points = [
            EnvelopePoint { tick: 0, value: 64 },
            EnvelopePoint { tick: 100, value: 64 },
        ];
        h.module.instruments[0].volume_envelope = Envelope::from_points(&points, Some(0), None);
        h.row(quiet(Note::On(C4), 1), 1);
        h.row(quiet(Note::Off, 0), 1);
        assert_eq!(h.ch.voice_volume, 40);
        assert!(h.ch.fading);
        assert_eq!(h.ch.fadeout, 65535 - 0x4000);

        h.row(quiet(Note::None, 0), 3);
        assert_eq!(h.ch.fadeout, 0);
        assert!(!h.ch.fading);
        assert_eq!(h.ch.final_volume, 0.0);
    }

    #[test]
    fn missing_instrument_kills_note() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.module.instruments[0].samples.clear();
        h.row(quiet(Note::None, 0), 1);
        assert!(!h.ch.note_on);
    }

    #[test]
    fn note_after_key_off_needs_instrument() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.row(quiet(Note::Off, 0), 1);
        h.row(quiet(Note::On(C4 + 12), 0), 1);
        assert!(!h.ch.note_on);
        assert_eq!(h.ch.period, xm_linear_period(C4 + 12, 0));
        h.row(quiet(Note::On(C4), 1), 1);
        assert!(h.ch.note_on);
    }

    #[test]
    fn porta_slides_toward_target() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.row(cell(Note::On(C4 + 1), 0, cmd('3'), 0x08), 3);
        assert_eq!(h.ch.period, xm_linear_period(C4, 0) - 64.0);
        assert_eq!(h.ch.period, xm_linear_period(C4 + 1, 0));
    }

    #[test]
    fn volume_column_porta_blocks_retrigger() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.ch.position = 50.0;
        let mut c = quiet(Note::On(C4 + 2), 0);
        c.volume = VolumeCommand::TonePorta(1);
        h.row(c, 2);
        assert_eq!(h.ch.position, 50.0);
        assert_eq!(h.ch.porta_speed, 0x10);
        assert_eq!(h.ch.period, xm_linear_period(C4, 0) - 64.0);
    }

    #[test]
    fn portamento_up_stops_note_at_bound() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.ch.set_period(10.0);
        h.row(cell(Note::None, 0, cmd('1'), 0x08), 2);
        assert!(!h.ch.note_on);
        assert_eq!(h.ch.period, 1.0);
    }

    #[test]
    fn fine_slides_are_immediate() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        let base = h.ch.period;
        h.row(cell(Note::None, 0, cmd('E'), 0x12), 4);
        assert_eq!(h.ch.period, base - 8.0);
        h.row(cell(Note::None, 0, 33, 0x23), 4);
        assert_eq!(h.ch.period, base - 5.0);
    }

    #[test]
    fn set_volume_and_fine_volume() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        h.row(cell(Note::None, 0, cmd('C'), 0x50), 1);
        assert_eq!(h.ch.voice_volume, 64);
        h.row(cell(Note::None, 0, cmd('E'), 0xb4), 3);
        assert_eq!(h.ch.voice_volume, 60);
    }

    #[test]
    fn volume_column_slides_on_later_ticks() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        let mut c = quiet(Note::None, 0);
        c.volume = VolumeCommand::SlideDown(2);
        h.row(c, 4);
        assert_eq!(h.ch.voice_volume, 34);
    }

    #[test]
    fn speed_and_tempo_share_f() {
        let mut h = Harness::new();
        h.row(cell(Note::None, 0, cmd('F'), 0x03), 1);
        assert_eq!(h.state.speed, 3);
        h.row(cell(Note::None, 0, cmd('F'), 0x7d), 1);
        assert_eq!(h.state.bpm, 0x7d);
        h.row(cell(Note::None, 0, cmd('F'), 0x00), 1);
        assert_eq!((h.state.speed, h.state.bpm), (3, 0x7d));
    }

    #[test]
    fn global_volume_slide_uses_memory() {
        let mut h = Harness::new();
        h.state.global_volume = 32;
        h.row(cell(Note::None, 0, 17, 0x20), 3);
        assert_eq!(h.state.global_volume, 36);
        h.row(cell(Note::None, 0, 17, 0x00), 2);
        assert_eq!(h.state.global_volume, 38);
    }

    #[test]
    fn pan_slide_moves_right() {
        let mut h = Harness::new();
        h.ch.pan = 0.0;
        h.row(cell(Note::None, 0, 25, 0x30), 3);
        assert!((h.ch.pan - 6.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn sample_offset_sets_cursor() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('9'), 0x02), 1);
        assert_eq!(h.ch.position, 512.0);
        assert_eq!(h.ch.trigger_ramp, 0.0);
    }

    #[test]
    fn retrigger_every_x_ticks() {
        let mut h = Harness::new();
        h.row(quiet(Note::On(C4), 1), 1);
        let c = cell(Note::None, 0, cmd('E'), 0x92);
        h.row(c, 2);
        h.ch.position = 80.0;
        h.state.tick = 2;
        h.state.flags.new_row = false;
        h.step(&c);
        assert_eq!(h.ch.position, 0.0);
    }

    #[test]
    fn arpeggio_uses_tick_mod_three() {
        let mut h = Harness::new();
        h.row(cell(Note::On(C4), 1, cmd('0'), 0x37), 4);
        assert_eq!(h.ch.voice_period, xm_linear_period(C4, 0));
        h.state.tick = 4;
        h.state.flags.new_row = false;
        h.step(&cell(Note::On(C4), 1, cmd('0'), 0x37));
        assert_eq!(h.ch.voice_period, xm_linear_period(C4 + 3, 0));
    }

    #[test]
    fn sync_from_e8() {
        let mut h = Harness::new();
        h.row(cell(Note::None, 0, cmd('E'), 0x87), 1);
        assert_eq!(h.sync.drain(), vec![7]);
    }
}

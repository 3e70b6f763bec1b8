//! FastTracker 2 (XM) format parser.

use log::{debug, warn};
use mp_ir::{
    AutoVibrato, Cell, ChannelSettings, Envelope, EnvelopePoint, Instrument, LoopType, Module,
    ModuleFormat, Note, OrderEntry, Pattern, Sample, SamplePitch, VolumeCommand, NO_COMMAND,
    SAMPLE_MAP_NOTES,
};

use crate::reader::{parse_string, ByteReader};
use crate::FormatError;

const MAGIC: &[u8] = b"Extended Module: ";
const MIN_VERSION: u16 = 0x0104;
const HEADER_OFFSET: usize = 60;
const MAX_CHANNELS: u16 = 64;
const INSTRUMENT_HEADER: usize = 241;
const MAX_ROWS: u16 = 256;

/// Load an XM file from bytes.
pub fn load_xm(data: &[u8]) -> Result<Module, FormatError> {
    let r = ByteReader::new(data);
    if r.slice_at(0, MAGIC.len()).ok() != Some(MAGIC) || r.u8_at(37).ok() != Some(0x1a) {
        return Err(FormatError::BadSignature);
    }
    let version = r.u16_at(58)?;
    if version < MIN_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let header_len = r.u32_at(HEADER_OFFSET)? as usize;
    let song_length = (r.u16_at(HEADER_OFFSET + 4)? as usize).min(256);
    let restart_position = r.u16_at(HEADER_OFFSET + 6)? as usize;
    let declared_channels = r.u16_at(HEADER_OFFSET + 8)?;
    let pattern_count = r.u16_at(HEADER_OFFSET + 10)? as usize;
    let instrument_count = r.u16_at(HEADER_OFFSET + 12)? as usize;
    let flags = r.u16_at(HEADER_OFFSET + 14)?;
    let initial_speed = r.u16_at(HEADER_OFFSET + 16)?.min(255) as u8;
    let initial_tempo = r.u16_at(HEADER_OFFSET + 18)?.min(255) as u8;
    let order_table = r.slice_at(HEADER_OFFSET + 20, 256)?;

    let channels = declared_channels.clamp(1, MAX_CHANNELS);
    if channels != declared_channels {
        warn!("xm channel count {declared_channels} clamped to {channels}");
    }
    let channels = channels as u8;

    let referenced = order_table.iter().copied().max().unwrap_or(0) as usize + 1;
    let mut patterns = vec![Pattern::new(64, channels); pattern_count.max(referenced)];

    let mut offset = HEADER_OFFSET + header_len;
    for (i, slot) in patterns.iter_mut().enumerate().take(pattern_count) {
        let pattern_header = r.u32_at(offset)? as usize;
        let declared_rows = r.u16_at(offset + 5)?;
        let rows = declared_rows.clamp(1, MAX_ROWS);
        if rows != declared_rows {
            warn!("xm pattern {i} row count {declared_rows} clamped to {rows}");
        }
        let packed_size = r.u16_at(offset + 7)? as usize;
        offset += pattern_header;

        let packed = r.tail_at(offset, packed_size);
        if packed.len() < packed_size {
            warn!("xm pattern {i} truncated");
        }
        *slot = match unpack_xm_pattern(packed, rows, channels) {
            Ok(p) => p,
            Err(e) => {
                warn!("xm pattern {i} data overrun: {e}");
                Pattern::new(rows, channels)
            }
        };
        offset += packed_size;
    }

    let mut instruments = Vec::with_capacity(instrument_count);
    for _ in 0..instrument_count {
        let (instrument, next) = parse_instrument(&r, offset)?;
        instruments.push(instrument);
        offset = next;
    }

    let mut module = Module::new("");
    module.title = r.string_at(17, 20)?;
    module.format = ModuleFormat::Xm {
        linear_periods: flags & 1 != 0,
    };
    module.channels = vec![ChannelSettings::default(); channels as usize];
    module.order = order_table[..song_length]
        .iter()
        .map(|&p| OrderEntry::Pattern(p))
        .collect();
    module.song_length = song_length;
    module.restart_position = restart_position;
    module.patterns = patterns;
    module.instruments = instruments;
    module.initial_speed = initial_speed;
    module.initial_tempo = initial_tempo;
    module.global_volume = 64;
    module.mix_divisor = 4.0 - 2.0 * (channels as f32 / 32.0);

    debug!(
        "xm '{}' v{:04x}: {} channels, {} orders, {} patterns, {} instruments, {} periods",
        module.title,
        version,
        module.channel_count(),
        module.song_length,
        module.patterns.len(),
        module.instruments.len(),
        if flags & 1 != 0 { "linear" } else { "amiga" }
    );
    Ok(module)
}

struct SampleHeader {
    bytes: usize,
    wide: bool,
    sample: Sample,
}

fn parse_instrument(r: &ByteReader, offset: usize) -> Result<(Instrument, usize), FormatError> {
    let header_len = r.u32_at(offset)? as usize;
    let mut instrument = Instrument::new("");
    instrument.name = r.string_at(offset + 4, 22)?;
    let sample_count = r.u16_at(offset + 27)? as usize;
    if sample_count == 0 {
        return Ok((instrument, offset + header_len));
    }

    let h = r.slice_at(offset, INSTRUMENT_HEADER)?;
    let sample_header_len = u32::from_le_bytes([h[29], h[30], h[31], h[32]]) as usize;
    instrument
        .sample_map
        .copy_from_slice(&h[33..33 + SAMPLE_MAP_NOTES]);

    let word = |at: usize| u16::from_le_bytes([h[at], h[at + 1]]);
    let points = |base: usize, count: u8| -> Vec<EnvelopePoint> {
        (0..count.min(12) as usize)
            .map(|j| EnvelopePoint {
                tick: word(base + j * 4),
                value: word(base + j * 4 + 2).min(64),
            })
            .collect()
    };
    instrument.volume_envelope = envelope(
        &points(129, h[225]),
        h[233],
        h[227],
        (h[228], h[229]),
        1.0,
    );
    instrument.panning_envelope = envelope(
        &points(177, h[226]),
        h[234],
        h[230],
        (h[231], h[232]),
        0.5,
    );
    instrument.vibrato = AutoVibrato {
        waveform: h[235],
        sweep: h[236],
        depth: h[237],
        rate: h[238],
    };
    instrument.fadeout = word(239);

    let mut offset = offset + header_len;
    let mut headers = Vec::with_capacity(sample_count);
    for _ in 0..sample_count {
        headers.push(parse_sample_header(r, offset)?);
        offset += sample_header_len;
    }

    for header in headers {
        let SampleHeader {
            bytes,
            wide,
            mut sample,
        } = header;
        let raw = r.tail_at(offset, bytes);
        if raw.len() < bytes {
            warn!(
                "xm sample '{}' truncated: {} of {} bytes",
                sample.name,
                raw.len(),
                bytes
            );
        }
        sample.data = if wide {
            let mut acc = 0i16;
            raw.chunks_exact(2)
                .map(|b| {
                    acc = acc.wrapping_add(i16::from_le_bytes([b[0], b[1]]));
                    acc as f32 / 32768.0
                })
                .collect()
        } else {
            let mut acc = 0i8;
            raw.iter()
                .map(|&b| {
                    acc = acc.wrapping_add(b as i8);
                    acc as f32 / 128.0
                })
                .collect()
        };
        if sample.loop_end > sample.data.len() && sample.loop_type != LoopType::None {
            warn!("xm sample '{}' loop end clamped", sample.name);
        }
        sample.clamp_loop();
        instrument.samples.push(sample);
        offset += bytes;
    }

    Ok((instrument, offset))
}

fn envelope(points: &[EnvelopePoint], kind: u8, sustain: u8, lp: (u8, u8), off: f32) -> Envelope {
    if kind & 1 == 0 || points.is_empty() {
        return Envelope::disabled(off);
    }
    Envelope::from_points(
        points,
        (kind & 2 != 0).then_some(sustain as usize),
        (kind & 4 != 0).then_some((lp.0 as usize, lp.1 as usize)),
    )
}

fn parse_sample_header(r: &ByteReader, offset: usize) -> Result<SampleHeader, FormatError> {
    let h = r.slice_at(offset, 40)?;
    let dword = |at: usize| u32::from_le_bytes([h[at], h[at + 1], h[at + 2], h[at + 3]]) as usize;
    let kind = h[14];
    let wide = kind & 16 != 0;
    let width = if wide { 2 } else { 1 };

    let mut sample = Sample::new("");
    sample.name = parse_string(&h[18..40]);
    let length = dword(0);
    sample.loop_start = dword(4) / width;
    sample.loop_end = sample.loop_start + dword(8) / width;
    sample.loop_type = match kind & 3 {
        0 => LoopType::None,
        2 => LoopType::PingPong,
        _ => LoopType::Forward,
    };
    sample.volume = h[12].min(64);
    sample.panning = Some(h[15]);
    sample.pitch = SamplePitch::Relative {
        relative_note: h[16] as i8,
        finetune: h[13] as i8,
    };
    Ok(SampleHeader {
        bytes: length - length % width,
        wide,
        sample,
    })
}

fn decode_volume(v: u8) -> VolumeCommand {
    let x = v & 0x0f;
    match v {
        0x00..=0x0f => VolumeCommand::None,
        0x10..=0x50 => VolumeCommand::Set(v - 0x10),
        0x51..=0x5f => VolumeCommand::None,
        _ => match v >> 4 {
            0x6 => VolumeCommand::SlideDown(x),
            0x7 => VolumeCommand::SlideUp(x),
            0x8 => VolumeCommand::FineSlideDown(x),
            0x9 => VolumeCommand::FineSlideUp(x),
            0xa => VolumeCommand::VibratoSpeed(x),
            0xb => VolumeCommand::Vibrato(x),
            0xc => VolumeCommand::SetPan(x),
            0xd => VolumeCommand::PanSlideLeft(x),
            0xe => VolumeCommand::PanSlideRight(x),
            _ => VolumeCommand::TonePorta(x),
        },
    }
}

fn encode_volume(v: VolumeCommand) -> u8 {
    match v {
        VolumeCommand::None => 0,
        VolumeCommand::Set(x) => 0x10 + x.min(64),
        VolumeCommand::SlideDown(x) => 0x60 | x,
        VolumeCommand::SlideUp(x) => 0x70 | x,
        VolumeCommand::FineSlideDown(x) => 0x80 | x,
        VolumeCommand::FineSlideUp(x) => 0x90 | x,
        VolumeCommand::VibratoSpeed(x) => 0xa0 | x,
        VolumeCommand::Vibrato(x) => 0xb0 | x,
        VolumeCommand::SetPan(x) => 0xc0 | x,
        VolumeCommand::PanSlideLeft(x) => 0xd0 | x,
        VolumeCommand::PanSlideRight(x) => 0xe0 | x,
        VolumeCommand::TonePorta(x) => 0xf0 | x,
    }
}

fn decode_cell(raw: [u8; 5]) -> Cell {
    let [note, instrument, volume, command, param] = raw;
    Cell {
        note: match note {
            0 => Note::None,
            n if n >= 97 => Note::Off,
            n => Note::On(n - 1),
        },
        instrument,
        volume: decode_volume(volume),
        command: if command == 0 && param == 0 {
            NO_COMMAND
        } else {
            command
        },
        param,
    }
}

fn encode_cell(cell: &Cell) -> [u8; 5] {
    let note = match cell.note {
        Note::None => 0,
        Note::Off => 97,
        Note::On(n) => n + 1,
    };
    let command = if cell.has_command() { cell.command } else { 0 };
    [note, cell.instrument, encode_volume(cell.volume), command, cell.param]
}

/// Decode packed XM pattern data into a dense grid.
pub fn unpack_xm_pattern(data: &[u8], rows: u16, channels: u8) -> Result<Pattern, FormatError> {
    let mut pattern = Pattern::new(rows, channels);
    if data.is_empty() {
        return Ok(pattern);
    }
    let mut r = ByteReader::new(data);
    let cells = pattern.data.len();
    let mut k = 0;
    while r.remaining() > 0 {
        let first = r.read_u8()?;
        let mut raw = [0u8; 5];
        if first & 0x80 != 0 {
            for (bit, slot) in raw.iter_mut().enumerate() {
                if first & (1 << bit) != 0 {
                    *slot = r.read_u8()?;
                }
            }
        } else {
            raw[0] = first;
            raw[1..].copy_from_slice(r.bytes(4)?);
        }
        if k < cells {
            pattern.data[k] = decode_cell(raw);
        } else if k == cells {
            warn!("xm pattern data longer than {rows} rows");
        }
        k += 1;
    }
    Ok(pattern)
}

/// Pack a pattern into XM packed storage (without the pattern header).
pub fn pack_xm_pattern(pattern: &Pattern) -> Vec<u8> {
    let mut out = Vec::new();
    for cell in &pattern.data {
        let raw = encode_cell(cell);
        let mut flags = 0x80u8;
        for (bit, &b) in raw.iter().enumerate() {
            if b != 0 {
                flags |= 1 << bit;
            }
        }
        if flags == 0x9f {
            out.extend_from_slice(&raw);
            continue;
        }
        out.push(flags);
        out.extend(raw.iter().copied().filter(|&b| b != 0));
    }
    out
}

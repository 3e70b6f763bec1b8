//! Scream Tracker 3 (S3M) format parser.

use log::{debug, warn};
use mp_ir::{
    Cell, ChannelSettings, Instrument, LoopType, Module, ModuleFormat, Note, OrderEntry, Pattern,
    Sample, SamplePitch, VolumeCommand, NO_COMMAND,
};

use crate::reader::{parse_string, ByteReader};
use crate::FormatError;

/// Rows in every S3M pattern.
pub const S3M_ROWS: u16 = 64;

/// Highest S3M command id (`Z`).
pub const S3M_LAST_COMMAND: u8 = 26;

const MAX_CHANNELS: usize = 32;

/// Load an S3M file from bytes.
pub fn load_s3m(data: &[u8]) -> Result<Module, FormatError> {
    let r = ByteReader::new(data);
    if r.slice_at(0x2c, 4).ok() != Some(b"SCRM".as_slice()) || r.u8_at(0x1d)? != 0x10 {
        return Err(FormatError::BadSignature);
    }
    r.slice_at(0, 0x60)?;

    let settings = r.slice_at(0x40, MAX_CHANNELS)?;
    let enabled = settings.iter().take_while(|&&c| c & 0x80 == 0).count();

    let mut pans = [0.5f32; MAX_CHANNELS];
    for (pan, &c) in pans.iter_mut().zip(settings) {
        if c & 0x80 == 0 {
            *pan = if c & 0x0f < 8 { 0.2 } else { 0.8 };
        }
    }

    let order_count = r.u16_at(0x20)? as usize;
    let instrument_count = r.u16_at(0x22)? as usize;
    let pattern_count = r.u16_at(0x24)? as usize;
    let flags = r.u16_at(0x26)?;
    let sample_format = r.u16_at(0x2a)?;
    let global_volume = r.u8_at(0x30)?.min(64);
    let initial_speed = r.u8_at(0x31)?;
    let initial_tempo = r.u8_at(0x32)?;
    let master = r.u8_at(0x33)?;

    let para_base = 0x60 + order_count;
    let pattern_para_base = para_base + instrument_count * 2;

    if r.u8_at(0x35)? == 0xfc {
        let table = r.slice_at(pattern_para_base + pattern_count * 2, MAX_CHANNELS)?;
        for (pan, &c) in pans.iter_mut().zip(table) {
            if c & 0x10 != 0 {
                *pan = (c & 0x0f) as f32 / 15.0;
            }
        }
    }
    if master & 0x80 == 0 {
        pans = [0.5; MAX_CHANNELS];
    }
    let mix_divisor = 128.0 / (master & 0x7f).max(0x10) as f32;

    let order: Vec<OrderEntry> = r
        .slice_at(0x60, order_count)?
        .iter()
        .map(|&b| OrderEntry::from_byte(b))
        .collect();
    let song_length = order.iter().filter(|e| **e != OrderEntry::End).count();

    let mut instruments = Vec::with_capacity(instrument_count);
    for i in 0..instrument_count {
        let offset = r.u16_at(para_base + i * 2)? as usize * 16;
        let sample = parse_sample(&r, offset, sample_format == 1)?;
        instruments.push(Instrument::single(sample));
    }

    let used = |pattern: usize| {
        order[..song_length.min(order.len())]
            .iter()
            .any(|e| *e == OrderEntry::Pattern(pattern as u8))
    };

    let mut max_channel = 0u8;
    let mut patterns = Vec::with_capacity(pattern_count);
    for i in 0..pattern_count {
        let offset = r.u16_at(pattern_para_base + i * 2)? as usize * 16;
        let mut pattern = Pattern::new(S3M_ROWS, enabled as u8);
        if offset == 0 {
            patterns.push(pattern);
            continue;
        }
        r.u16_at(offset)?;
        let mut cursor = ByteReader::new(data);
        cursor.seek(offset + 2);
        let highest = match unpack_rows(&mut cursor, &mut pattern) {
            Ok(h) => h,
            Err(e) => {
                warn!("s3m pattern {i} data overrun: {e}");
                None
            }
        };
        if let Some(h) = highest {
            if used(i) {
                max_channel = max_channel.max(h);
            }
        }
        patterns.push(pattern);
    }

    let channel_count = (max_channel + 1).min(enabled.max(1) as u8);
    let patterns: Vec<Pattern> = patterns
        .iter()
        .map(|p| {
            if p.channels == channel_count {
                p.clone()
            } else {
                widen(p, channel_count)
            }
        })
        .collect();

    let mut module = Module::new("");
    module.title = r.string_at(0, 28)?;
    module.format = ModuleFormat::S3m {
        fast_volume_slides: flags & 0x40 != 0,
    };
    module.channels = pans[..channel_count as usize]
        .iter()
        .map(|&initial_pan| ChannelSettings { initial_pan })
        .collect();
    module.order = order;
    module.song_length = song_length;
    module.patterns = patterns;
    module.instruments = instruments;
    module.initial_speed = initial_speed;
    module.initial_tempo = initial_tempo;
    module.global_volume = global_volume;
    module.mix_divisor = mix_divisor;

    debug!(
        "s3m '{}': {} channels, {} orders ({} playable), {} patterns, {} instruments",
        module.title,
        module.channel_count(),
        module.order.len(),
        module.song_length,
        module.patterns.len(),
        module.instruments.len()
    );
    Ok(module)
}

/// Resize a pattern's channel count, keeping leading columns.
fn widen(pattern: &Pattern, channels: u8) -> Pattern {
    if channels <= pattern.channels {
        return pattern.truncated(channels);
    }
    let mut out = Pattern::new(pattern.rows, channels);
    for row in 0..pattern.rows {
        for ch in 0..pattern.channels {
            *out.cell_mut(row, ch) = *pattern.cell(row, ch);
        }
    }
    out
}

fn parse_sample(r: &ByteReader, offset: usize, signed: bool) -> Result<Sample, FormatError> {
    let header = r.slice_at(offset, 0x50)?;
    let mut sample = Sample::new("");
    sample.name = parse_string(&header[0x30..0x4c]);
    sample.volume = header[0x1c].min(64);
    sample.pitch = SamplePitch::C2Speed(u16::from_le_bytes([header[0x20], header[0x21]]) as u32);

    if header[0] != 1 {
        return Ok(sample);
    }

    let data_offset = ((header[0x0d] as usize) << 16
        | header[0x0e] as usize
        | (header[0x0f] as usize) << 8)
        * 16;
    let length = u16::from_le_bytes([header[0x10], header[0x11]]) as usize;
    let loop_start = u16::from_le_bytes([header[0x14], header[0x15]]) as usize;
    let loop_end = u16::from_le_bytes([header[0x18], header[0x19]]) as usize;
    let flags = header[0x1f];
    let stereo = flags & 2 != 0;
    let wide = flags & 4 != 0;

    let width = if wide { 2 } else { 1 };
    let channels = if stereo { 2 } else { 1 };
    let want = length * width * channels;
    let bytes = r.tail_at(data_offset, want);
    if bytes.len() < want {
        warn!(
            "s3m sample '{}' truncated: {} of {} bytes",
            sample.name,
            bytes.len(),
            want
        );
    }

    let decode = |i: usize| -> f32 {
        if wide {
            match bytes.get(i * 2..i * 2 + 2) {
                Some(b) => {
                    let raw = u16::from_le_bytes([b[0], b[1]]);
                    let v = if signed { raw as i16 as i32 } else { raw as i32 - 32768 };
                    v as f32 / 32768.0
                }
                None => 0.0,
            }
        } else {
            match bytes.get(i) {
                Some(&b) => {
                    let v = if signed { b as i8 as i32 } else { b as i32 - 128 };
                    v as f32 / 128.0
                }
                None => 0.0,
            }
        }
    };

    let frames = (bytes.len() / (width * channels)).min(length);
    sample.data = (0..frames)
        .map(|i| {
            if stereo {
                (decode(i) + decode(i + length)) * 0.5
            } else {
                decode(i)
            }
        })
        .collect();

    if flags & 1 != 0 {
        sample.loop_type = LoopType::Forward;
        sample.loop_start = loop_start;
        sample.loop_end = loop_end;
        if loop_end > sample.data.len() {
            warn!("s3m sample '{}' loop end clamped", sample.name);
        }
        sample.clamp_loop();
    }
    Ok(sample)
}

fn decode_note(raw: u8) -> Note {
    match raw {
        254 => Note::Off,
        255 => Note::None,
        n if n & 0x0f < 12 => Note::from_raw((n >> 4) * 12 + (n & 0x0f)),
        _ => Note::None,
    }
}

fn encode_note(note: Note) -> u8 {
    match note {
        Note::None => 255,
        Note::Off => 254,
        Note::On(n) => ((n / 12) << 4) | (n % 12),
    }
}

/// Unpack 64 rows of packed cell data, returning the highest channel seen.
fn unpack_rows(r: &mut ByteReader, pattern: &mut Pattern) -> Result<Option<u8>, FormatError> {
    let mut highest = None;
    let mut row = 0u16;
    while row < S3M_ROWS {
        let what = r.read_u8()?;
        if what == 0 {
            row += 1;
            continue;
        }
        let ch = what & 31;
        if ch >= pattern.channels {
            let skip = if what & 32 != 0 { 2 } else { 0 }
                + if what & 64 != 0 { 1 } else { 0 }
                + if what & 128 != 0 { 2 } else { 0 };
            r.skip(skip)?;
            continue;
        }
        highest = highest.max(Some(ch));
        let cell = pattern.cell_mut(row, ch);
        if what & 32 != 0 {
            cell.note = decode_note(r.read_u8()?);
            cell.instrument = r.read_u8()?;
        }
        if what & 64 != 0 {
            let volume = r.read_u8()?;
            cell.volume = if volume <= 64 {
                VolumeCommand::Set(volume)
            } else {
                VolumeCommand::None
            };
        }
        if what & 128 != 0 {
            let command = r.read_u8()?;
            cell.param = r.read_u8()?;
            cell.command = if command == 0 || command > S3M_LAST_COMMAND {
                NO_COMMAND
            } else {
                command
            };
        }
    }
    Ok(highest)
}

/// Decode one packed pattern (including its leading length word).
pub fn unpack_s3m_pattern(data: &[u8], channels: u8) -> Result<Pattern, FormatError> {
    let mut r = ByteReader::new(data);
    r.read_u16_le()?;
    let mut pattern = Pattern::new(S3M_ROWS, channels);
    unpack_rows(&mut r, &mut pattern)?;
    Ok(pattern)
}

/// Pack a pattern into S3M storage, prefixed by its packed length.
pub fn pack_s3m_pattern(pattern: &Pattern) -> Vec<u8> {
    let mut out = vec![0u8, 0u8];
    for row in 0..S3M_ROWS {
        if row < pattern.rows {
            for (ch, cell) in pattern.row(row).iter().enumerate().take(32) {
                push_cell(&mut out, ch as u8, cell);
            }
        }
        out.push(0);
    }
    let len = out.len() as u16;
    out[..2].copy_from_slice(&len.to_le_bytes());
    out
}

fn push_cell(out: &mut Vec<u8>, ch: u8, cell: &Cell) {
    let has_note = cell.note != Note::None || cell.instrument != 0;
    let has_volume = cell.volume.set_volume().is_some();
    let has_command = cell.has_command();
    if !(has_note || has_volume || has_command) {
        return;
    }
    let mut what = ch;
    if has_note {
        what |= 32;
    }
    if has_volume {
        what |= 64;
    }
    if has_command {
        what |= 128;
    }
    out.push(what);
    if has_note {
        out.push(encode_note(cell.note));
        out.push(cell.instrument);
    }
    if let Some(v) = cell.volume.set_volume() {
        out.push(v);
    }
    if has_command {
        out.push(cell.command);
        out.push(cell.param);
    }
}

//! Synthetic S3M / XM image builders shared by the integration tests.

#![allow(dead_code)]

use mp_formats::{pack_s3m_pattern, pack_xm_pattern};
use mp_ir::{Cell, Note, Pattern, VolumeCommand, NO_COMMAND};

/// Cell with a note and instrument and nothing else.
pub fn note(n: u8, instrument: u8) -> Cell {
    Cell {
        note: Note::On(n),
        instrument,
        ..Cell::empty()
    }
}

/// Cell carrying only an effect command.
pub fn command(command: u8, param: u8) -> Cell {
    Cell {
        command,
        param,
        ..Cell::empty()
    }
}

/// Cell with a note, instrument and effect.
pub fn note_command(n: u8, instrument: u8, command: u8, param: u8) -> Cell {
    Cell {
        note: Note::On(n),
        instrument,
        command,
        param,
        ..Cell::empty()
    }
}

pub fn with_volume(mut cell: Cell, v: u8) -> Cell {
    cell.volume = VolumeCommand::Set(v);
    cell
}

pub fn empty_pattern(rows: u16, channels: u8) -> Pattern {
    Pattern::new(rows, channels)
}

/// S3M command id for a letter (`'A'` = 1).
pub fn s3m_cmd(letter: char) -> u8 {
    letter as u8 - b'A' + 1
}

/// XM command id for a hex digit or letter (`'0'`..`'9'`, `'A'` = 10).
pub fn xm_cmd(c: char) -> u8 {
    match c {
        '0'..='9' => c as u8 - b'0',
        _ => c as u8 - b'A' + 10,
    }
}

fn align16(buf: &mut Vec<u8>) {
    while buf.len() % 16 != 0 {
        buf.push(0);
    }
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut [u8], at: usize, len: usize, s: &str) {
    for (i, b) in s.bytes().take(len).enumerate() {
        buf[at + i] = b;
    }
}

// ---------------------------------------------------------------------------
// S3M
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct S3mSample {
    pub name: String,
    /// Stored PCM bytes as they appear in the file
    pub raw: Vec<u8>,
    pub frames: usize,
    pub flags: u8,
    pub c2spd: u32,
    pub volume: u8,
    pub loop_start: u16,
    pub loop_end: u16,
    pub kind: u8,
}

impl S3mSample {
    /// 8-bit sample from signed values, stored unsigned.
    pub fn pcm8(data: &[i8]) -> Self {
        Self {
            name: "sample".into(),
            raw: data.iter().map(|&v| (v as i16 + 128) as u8).collect(),
            frames: data.len(),
            flags: 0,
            c2spd: 8363,
            volume: 64,
            loop_start: 0,
            loop_end: 0,
            kind: 1,
        }
    }

    /// 16-bit sample from signed values, stored unsigned.
    pub fn pcm16(data: &[i16]) -> Self {
        let mut s = Self::pcm8(&[]);
        s.raw = data
            .iter()
            .flat_map(|&v| ((v as i32 + 32768) as u16).to_le_bytes())
            .collect();
        s.frames = data.len();
        s.flags = 4;
        s
    }

    /// 8-bit stereo sample: left block then right block.
    pub fn stereo8(left: &[i8], right: &[i8]) -> Self {
        let mut s = Self::pcm8(left);
        s.raw.extend(right.iter().map(|&v| (v as i16 + 128) as u8));
        s.flags = 2;
        s
    }

    pub fn looped(mut self, start: u16, end: u16) -> Self {
        self.flags |= 1;
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    pub fn c2spd(mut self, c2spd: u32) -> Self {
        self.c2spd = c2spd;
        self
    }

    pub fn volume(mut self, volume: u8) -> Self {
        self.volume = volume;
        self
    }
}

pub struct S3mBuilder {
    pub title: String,
    /// Channel setting bytes; slots past this list are disabled
    pub channel_settings: Vec<u8>,
    pub orders: Vec<u8>,
    pub samples: Vec<S3mSample>,
    pub patterns: Vec<Pattern>,
    pub speed: u8,
    pub tempo: u8,
    pub global_volume: u8,
    pub master: u8,
    pub flags: u16,
    pub pan_table: Option<[u8; 32]>,
    /// Patterns stored with a zero parapointer
    pub null_patterns: Vec<usize>,
}

impl S3mBuilder {
    pub fn new(channels: usize) -> Self {
        Self {
            title: "test song".into(),
            channel_settings: (0..channels)
                .map(|i| if i % 2 == 0 { i as u8 } else { 8 + i as u8 })
                .collect(),
            orders: vec![0],
            samples: Vec::new(),
            patterns: Vec::new(),
            speed: 6,
            tempo: 125,
            global_volume: 64,
            master: 0x80 | 0x30,
            flags: 0,
            pan_table: None,
            null_patterns: Vec::new(),
        }
    }

    pub fn sample(mut self, sample: S3mSample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn orders(mut self, orders: &[u8]) -> Self {
        self.orders = orders.to_vec();
        self
    }

    pub fn speed(mut self, speed: u8, tempo: u8) -> Self {
        self.speed = speed;
        self.tempo = tempo;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 0x60];
        put_str(&mut buf, 0, 28, &self.title);
        buf[0x1c] = 0x1a;
        buf[0x1d] = 0x10;
        put_u16(&mut buf, 0x20, self.orders.len() as u16);
        put_u16(&mut buf, 0x22, self.samples.len() as u16);
        put_u16(&mut buf, 0x24, self.patterns.len() as u16);
        put_u16(&mut buf, 0x26, self.flags);
        put_u16(&mut buf, 0x28, 0x1320);
        put_u16(&mut buf, 0x2a, 2);
        buf[0x2c..0x30].copy_from_slice(b"SCRM");
        buf[0x30] = self.global_volume;
        buf[0x31] = self.speed;
        buf[0x32] = self.tempo;
        buf[0x33] = self.master;
        if self.pan_table.is_some() {
            buf[0x35] = 0xfc;
        }
        for i in 0..32 {
            buf[0x40 + i] = self.channel_settings.get(i).copied().unwrap_or(0xff);
        }

        buf.extend_from_slice(&self.orders);
        let ins_para = buf.len();
        buf.resize(buf.len() + self.samples.len() * 2, 0);
        let pat_para = buf.len();
        buf.resize(buf.len() + self.patterns.len() * 2, 0);
        if let Some(table) = self.pan_table {
            buf.extend_from_slice(&table);
        }

        let mut headers = Vec::new();
        for (i, _) in self.samples.iter().enumerate() {
            align16(&mut buf);
            let para = (buf.len() / 16) as u16;
            put_u16(&mut buf, ins_para + i * 2, para);
            headers.push(buf.len());
            buf.resize(buf.len() + 0x50, 0);
        }

        for (i, pattern) in self.patterns.iter().enumerate() {
            if self.null_patterns.contains(&i) {
                continue;
            }
            align16(&mut buf);
            let para = (buf.len() / 16) as u16;
            put_u16(&mut buf, pat_para + i * 2, para);
            buf.extend_from_slice(&pack_s3m_pattern(pattern));
        }

        for (s, &h) in self.samples.iter().zip(&headers) {
            align16(&mut buf);
            let para = buf.len() / 16;
            buf[h] = s.kind;
            buf[h + 0x0d] = (para >> 16) as u8;
            put_u16(&mut buf, h + 0x0e, para as u16);
            put_u32(&mut buf, h + 0x10, s.frames as u32);
            put_u32(&mut buf, h + 0x14, s.loop_start as u32);
            put_u32(&mut buf, h + 0x18, s.loop_end as u32);
            buf[h + 0x1c] = s.volume;
            buf[h + 0x1f] = s.flags;
            put_u32(&mut buf, h + 0x20, s.c2spd);
            put_str(&mut buf, h + 0x30, 28, &s.name);
            buf[h + 0x4c..h + 0x50].copy_from_slice(b"SCRS");
            buf.extend_from_slice(&s.raw);
        }
        buf
    }
}

// ---------------------------------------------------------------------------
// XM
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct XmSample {
    pub name: String,
    pub data: Vec<i16>,
    pub wide: bool,
    pub loop_start: u32,
    pub loop_len: u32,
    pub loop_type: u8,
    pub volume: u8,
    pub finetune: i8,
    pub panning: u8,
    pub relative_note: i8,
}

impl XmSample {
    pub fn pcm8(data: &[i8]) -> Self {
        Self {
            name: "xm sample".into(),
            data: data.iter().map(|&v| v as i16).collect(),
            wide: false,
            loop_start: 0,
            loop_len: 0,
            loop_type: 0,
            volume: 64,
            finetune: 0,
            panning: 128,
            relative_note: 0,
        }
    }

    pub fn pcm16(data: &[i16]) -> Self {
        let mut s = Self::pcm8(&[]);
        s.data = data.to_vec();
        s.wide = true;
        s
    }

    /// Loop in frames; `ping_pong` selects loop type 2.
    pub fn looped(mut self, start: u32, len: u32, ping_pong: bool) -> Self {
        self.loop_start = start;
        self.loop_len = len;
        self.loop_type = if ping_pong { 2 } else { 1 };
        self
    }

    fn encoded(&self) -> Vec<u8> {
        if self.wide {
            let mut prev = 0i16;
            self.data
                .iter()
                .flat_map(|&v| {
                    let d = v.wrapping_sub(prev);
                    prev = v;
                    d.to_le_bytes()
                })
                .collect()
        } else {
            let mut prev = 0i8;
            self.data
                .iter()
                .map(|&v| {
                    let v = v as i8;
                    let d = v.wrapping_sub(prev);
                    prev = v;
                    d as u8
                })
                .collect()
        }
    }
}

#[derive(Clone, Default)]
pub struct XmEnvelope {
    pub points: Vec<(u16, u16)>,
    pub sustain: Option<u8>,
    pub loop_points: Option<(u8, u8)>,
}

impl XmEnvelope {
    fn kind(&self) -> u8 {
        if self.points.is_empty() {
            return 0;
        }
        let sustain = if self.sustain.is_some() { 2 } else { 0 };
        let looped = if self.loop_points.is_some() { 4 } else { 0 };
        1 | sustain | looped
    }
}

#[derive(Clone, Default)]
pub struct XmInstrument {
    pub name: String,
    pub samples: Vec<XmSample>,
    pub sample_map: Vec<u8>,
    pub volume_envelope: XmEnvelope,
    pub panning_envelope: XmEnvelope,
    pub fadeout: u16,
    pub vibrato: [u8; 4],
}

impl XmInstrument {
    pub fn with_sample(sample: XmSample) -> Self {
        Self {
            name: "instrument".into(),
            samples: vec![sample],
            sample_map: vec![0; 96],
            ..Default::default()
        }
    }
}

pub struct XmBuilder {
    pub title: String,
    pub channels: u16,
    pub linear: bool,
    pub version: u16,
    pub speed: u16,
    pub tempo: u16,
    pub restart: u16,
    pub orders: Vec<u8>,
    pub patterns: Vec<Pattern>,
    pub instruments: Vec<XmInstrument>,
}

impl XmBuilder {
    pub fn new(channels: u16) -> Self {
        Self {
            title: "xm test".into(),
            channels,
            linear: true,
            version: 0x0104,
            speed: 6,
            tempo: 125,
            restart: 0,
            orders: vec![0],
            patterns: Vec::new(),
            instruments: Vec::new(),
        }
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn instrument(mut self, instrument: XmInstrument) -> Self {
        self.instruments.push(instrument);
        self
    }

    pub fn orders(mut self, orders: &[u8]) -> Self {
        self.orders = orders.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 60 + 276];
        put_str(&mut buf, 0, 17, "Extended Module: ");
        put_str(&mut buf, 17, 20, &self.title);
        buf[37] = 0x1a;
        put_str(&mut buf, 38, 20, "modplay builder");
        put_u16(&mut buf, 58, self.version);
        put_u32(&mut buf, 60, 276);
        put_u16(&mut buf, 64, self.orders.len() as u16);
        put_u16(&mut buf, 66, self.restart);
        put_u16(&mut buf, 68, self.channels);
        put_u16(&mut buf, 70, self.patterns.len() as u16);
        put_u16(&mut buf, 72, self.instruments.len() as u16);
        put_u16(&mut buf, 74, self.linear as u16);
        put_u16(&mut buf, 76, self.speed);
        put_u16(&mut buf, 78, self.tempo);
        buf[80..80 + self.orders.len()].copy_from_slice(&self.orders);

        for pattern in &self.patterns {
            let packed = pack_xm_pattern(pattern);
            let at = buf.len();
            buf.resize(at + 9, 0);
            put_u32(&mut buf, at, 9);
            put_u16(&mut buf, at + 5, pattern.rows);
            put_u16(&mut buf, at + 7, packed.len() as u16);
            buf.extend_from_slice(&packed);
        }

        for inst in &self.instruments {
            let at = buf.len();
            let header_len = if inst.samples.is_empty() { 29 } else { 263 };
            buf.resize(at + header_len, 0);
            put_u32(&mut buf, at, header_len as u32);
            put_str(&mut buf, at + 4, 22, &inst.name);
            put_u16(&mut buf, at + 27, inst.samples.len() as u16);
            if inst.samples.is_empty() {
                continue;
            }
            put_u32(&mut buf, at + 29, 40);
            for (i, &s) in inst.sample_map.iter().take(96).enumerate() {
                buf[at + 33 + i] = s;
            }
            for (base, env) in [(129, &inst.volume_envelope), (177, &inst.panning_envelope)] {
                for (j, &(x, y)) in env.points.iter().take(12).enumerate() {
                    put_u16(&mut buf, at + base + j * 4, x);
                    put_u16(&mut buf, at + base + j * 4 + 2, y);
                }
            }
            let v = &inst.volume_envelope;
            let p = &inst.panning_envelope;
            buf[at + 225] = v.points.len() as u8;
            buf[at + 226] = p.points.len() as u8;
            buf[at + 227] = v.sustain.unwrap_or(0);
            buf[at + 228] = v.loop_points.map(|l| l.0).unwrap_or(0);
            buf[at + 229] = v.loop_points.map(|l| l.1).unwrap_or(0);
            buf[at + 230] = p.sustain.unwrap_or(0);
            buf[at + 231] = p.loop_points.map(|l| l.0).unwrap_or(0);
            buf[at + 232] = p.loop_points.map(|l| l.1).unwrap_or(0);
            buf[at + 233] = v.kind();
            buf[at + 234] = p.kind();
            buf[at + 235..at + 239].copy_from_slice(&inst.vibrato);
            put_u16(&mut buf, at + 239, inst.fadeout);

            for s in &inst.samples {
                let width = if s.wide { 2 } else { 1 };
                let h = buf.len();
                buf.resize(h + 40, 0);
                put_u32(&mut buf, h, s.data.len() as u32 * width);
                put_u32(&mut buf, h + 4, s.loop_start * width);
                put_u32(&mut buf, h + 8, s.loop_len * width);
                buf[h + 12] = s.volume;
                buf[h + 13] = s.finetune as u8;
                buf[h + 14] = s.loop_type | if s.wide { 16 } else { 0 };
                buf[h + 15] = s.panning;
                buf[h + 16] = s.relative_note as u8;
                put_str(&mut buf, h + 18, 22, &s.name);
            }
            for s in &inst.samples {
                buf.extend_from_slice(&s.encoded());
            }
        }
        buf
    }
}

/// Command placeholder for "no effect" in hand-built cells.
pub const NONE: u8 = NO_COMMAND;

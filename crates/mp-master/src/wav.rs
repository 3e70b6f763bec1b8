//! WAV encoding for 16-bit stereo PCM.

use std::io::{Cursor, Seek, Write};

use hound::{SampleFormat, WavSpec, WavWriter};
use mp_engine::Frame;

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Encode `frames` as a 16-bit stereo WAV stream.
pub fn write_wav<W: Write + Seek>(
    writer: W,
    frames: &[Frame],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut wav = WavWriter::new(writer, spec(sample_rate))?;
    for frame in frames {
        let [left, right] = frame.to_i16();
        wav.write_sample(left)?;
        wav.write_sample(right)?;
    }
    wav.finalize()
}

/// Encode `frames` into an in-memory WAV file.
pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(&mut cursor, frames, sample_rate)?;
    Ok(cursor.into_inner())
}

//! Bounds-checked little-endian cursor over a module image.

use arrayvec::ArrayString;

use crate::FormatError;

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.bytes(n).map(|_| ())
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, FormatError> {
        let v = self.u8_at(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16, FormatError> {
        let v = self.u16_at(self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let slice = self.slice_at(self.pos, n)?;
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8_at(&self, offset: usize) -> Result<u8, FormatError> {
        self.data
            .get(offset)
            .copied()
            .ok_or(FormatError::UnexpectedEof { offset })
    }

    pub(crate) fn u16_at(&self, offset: usize) -> Result<u16, FormatError> {
        let b = self.slice_at(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32_at(&self, offset: usize) -> Result<u32, FormatError> {
        let b = self.slice_at(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn slice_at(&self, offset: usize, n: usize) -> Result<&'a [u8], FormatError> {
        let end = offset
            .checked_add(n)
            .ok_or(FormatError::UnexpectedEof { offset })?;
        self.data
            .get(offset..end)
            .ok_or(FormatError::UnexpectedEof { offset })
    }

    /// Up to `n` bytes from `offset`, shortened at the end of the image.
    pub(crate) fn tail_at(&self, offset: usize, n: usize) -> &'a [u8] {
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(n).min(self.data.len());
        &self.data[start..end]
    }

    pub(crate) fn string_at<const N: usize>(
        &self,
        offset: usize,
        n: usize,
    ) -> Result<ArrayString<N>, FormatError> {
        Ok(parse_string(self.slice_at(offset, n)?))
    }
}

/// Decode a NUL-padded name field, keeping printable ASCII only.
pub(crate) fn parse_string<const N: usize>(bytes: &[u8]) -> ArrayString<N> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let mut out = ArrayString::new();
    for &b in &bytes[..end] {
        let c = if (0x20..0x7f).contains(&b) { b as char } else { ' ' };
        if out.try_push(c).is_err() {
            break;
        }
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

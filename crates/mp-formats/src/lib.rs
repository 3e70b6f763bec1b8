//! Format parsers for modplay.
//!
//! Parses S3M and XM files into the module data model. Loading never
//! panics on malformed input: structural truncation is reported as
//! [`FormatError::UnexpectedEof`], damaged sample data is shortened.

mod reader;
mod s3m;
mod xm;

use std::path::Path;

pub use s3m::{load_s3m, pack_s3m_pattern, unpack_s3m_pattern, S3M_LAST_COMMAND, S3M_ROWS};
pub use xm::{load_xm, pack_xm_pattern, unpack_xm_pattern};

use mp_ir::Module;

/// Error type for format parsing.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Magic bytes do not match any supported format
    #[error("unrecognized module signature")]
    BadSignature,
    /// Known format, but a version this loader does not handle
    #[error("unsupported format version {0:#06x}")]
    UnsupportedVersion(u16),
    /// A structural field lies beyond the end of the data
    #[error("unexpected end of data at offset {offset:#x}")]
    UnexpectedEof { offset: usize },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Detect the format from its signature and load the module.
pub fn load_module(data: &[u8]) -> Result<Module, FormatError> {
    if data.starts_with(b"Extended Module: ") {
        return load_xm(data);
    }
    if data.get(0x2c..0x30) == Some(b"SCRM".as_slice()) {
        return load_s3m(data);
    }
    Err(FormatError::BadSignature)
}

/// Read a file and load it with [`load_module`].
pub fn load_module_file(path: impl AsRef<Path>) -> Result<Module, FormatError> {
    let data = std::fs::read(path)?;
    load_module(&data)
}

//! HFile v1 on-disk format: constants, version tag and trailer.
//!
//! # On-disk layout
//!
//! ```text
//! [DATA_BLOCK] × N          offset/size recorded in the data index
//! ...                       file info, meta blocks (not read)
//! [DATA_INDEX]              IDXBLK)+ then {offset u64, size u32, uvarint len, first key} × N
//! [META_INDEX]              optional, bounds the data index when present
//! [TRAILER 56B]             TRABLK"$ then seven big-endian fields
//! [VERSION 4B]              big-endian u32: minor << 24 | major
//! ```
//!
//! A data block decodes (after optional Snappy framing) to:
//!
//! ```text
//! DATABLK* {key_len u32, val_len u32, key, value} × M
//! ```
//!
//! All structures are validated eagerly: the version tag must be (1, 0)
//! and every magic literal must match before any field behind it is trusted.
//!
//! # Sub-modules
//!
//! - [`version`]: [`Version`] decoding and the supported-version gate.
//! - [`trailer`]: [`Trailer`] decoding.

pub mod trailer;
pub mod version;

#[cfg(test)]
mod tests;

pub use trailer::Trailer;
pub use version::Version;

use std::fmt;

use crate::encoding::EncodingError;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Magic literal at the start of the trailer.
pub const TRAILER_MAGIC: [u8; 8] = *b"TRABLK\"$";

/// Magic literal at the start of the data index.
pub const DATA_INDEX_MAGIC: [u8; 8] = *b"IDXBLK)+";

/// Magic literal at the start of every decoded data block.
pub const DATA_BLOCK_MAGIC: [u8; 8] = *b"DATABLK*";

/// Length of every magic literal.
pub const MAGIC_SIZE: usize = 8;

/// Size of the packed version tag at the very end of the file.
pub const VERSION_SIZE: usize = 4;

/// Size of the trailer record, magic included, version excluded.
pub const TRAILER_SIZE: usize = 56;

/// Distance of the trailer start from the end of the file.
pub const TRAILER_OFFSET_FROM_END: usize = TRAILER_SIZE + VERSION_SIZE;

/// The only accepted major version.
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// The only accepted minor version.
pub const SUPPORTED_MINOR_VERSION: u32 = 0;

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// The structure a magic literal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Trailer,
    DataIndex,
    DataBlock,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Trailer => "trailer",
            Section::DataIndex => "data index",
            Section::DataBlock => "data block",
        };
        f.write_str(name)
    }
}

/// Errors raised while decoding an HFile.
///
/// Every variant is fatal for the file it was raised on; the reader never
/// hands out a partially decoded file.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The version tag is not (1, 0).
    #[error("unsupported HFile version {major}.{minor}")]
    UnsupportedVersion {
        /// Decoded major version (low 24 bits).
        major: u32,
        /// Decoded minor version (high 8 bits).
        minor: u32,
    },

    /// A magic literal did not match.
    #[error("bad {section} magic: {found:02X?}")]
    BadMagic {
        /// Which structure carried the magic.
        section: Section,
        /// The bytes actually found.
        found: [u8; MAGIC_SIZE],
    },

    /// The trailer names a compression codec this reader does not implement.
    #[error("unsupported compression codec {0}")]
    UnsupportedCodec(u32),

    /// A data block failed framing or decompression checks.
    #[error("corrupt block at offset {offset}: {reason}")]
    CorruptBlock {
        /// File offset of the block.
        offset: u64,
        /// Description of the failed check.
        reason: String,
    },

    /// An offset/length pair points outside the file.
    #[error("{what} range {start}..{end} out of bounds (file is {len} bytes)")]
    OutOfBounds {
        /// What was being sliced.
        what: &'static str,
        /// Requested start offset.
        start: u64,
        /// Requested end offset.
        end: u64,
        /// Length of the byte source.
        len: usize,
    },

    /// A structure ended before all of its fields could be read.
    #[error("truncated {0}")]
    Truncated(String),

    /// A primitive field failed to decode.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// Returns `bytes[start..end]`, or [`FormatError::OutOfBounds`] if the
/// range is inverted or runs past the end of `bytes`.
pub(crate) fn slice_range<'a>(
    bytes: &'a [u8],
    what: &'static str,
    start: u64,
    end: u64,
) -> Result<&'a [u8], FormatError> {
    let oob = || FormatError::OutOfBounds {
        what,
        start,
        end,
        len: bytes.len(),
    };
    if start > end {
        return Err(oob());
    }
    let s = usize::try_from(start).map_err(|_| oob())?;
    let e = usize::try_from(end).map_err(|_| oob())?;
    bytes.get(s..e).ok_or_else(oob)
}

/// Checks a decoded magic literal against the expected constant.
pub(crate) fn check_magic(
    section: Section,
    found: [u8; MAGIC_SIZE],
    expected: &[u8; MAGIC_SIZE],
) -> Result<(), FormatError> {
    if &found != expected {
        return Err(FormatError::BadMagic { section, found });
    }
    Ok(())
}

//! Per-block compression framing.
//!
//! The trailer names one codec for the whole file. Two are supported:
//!
//! | id | codec   | on-disk block                                         |
//! |----|---------|-------------------------------------------------------|
//! | 2  | none    | `size` raw bytes                                      |
//! | 3  | Snappy  | `uncompressed u32, compressed u32, payload`           |
//!
//! Uncompressed blocks are never copied: the decoded buffer is a range of
//! the mapped file. Snappy blocks are decompressed into an owned buffer
//! after their framing has been checked against the size the data index
//! declares.

use std::fmt;

use snap::raw::{Decoder, decompress_len};

use crate::encoding::{ByteReader, len_to_usize};
use crate::format::{FormatError, slice_range};

/// Size of the Snappy framing header (`uncompressed u32` + `compressed u32`).
pub const SNAPPY_HEADER_SIZE: u64 = 8;

// ------------------------------------------------------------------------------------------------
// Codec
// ------------------------------------------------------------------------------------------------

/// Compression applied to every data block of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Blocks are stored raw.
    None,

    /// Blocks are Snappy-compressed behind an 8-byte size header.
    Snappy,
}

impl Codec {
    /// Wire id of [`Codec::None`].
    pub const NONE_ID: u32 = 2;

    /// Wire id of [`Codec::Snappy`].
    pub const SNAPPY_ID: u32 = 3;

    /// Returns the trailer id for this codec.
    pub fn id(self) -> u32 {
        match self {
            Codec::None => Self::NONE_ID,
            Codec::Snappy => Self::SNAPPY_ID,
        }
    }
}

impl TryFrom<u32> for Codec {
    type Error = FormatError;

    fn try_from(id: u32) -> Result<Self, FormatError> {
        match id {
            Self::NONE_ID => Ok(Codec::None),
            Self::SNAPPY_ID => Ok(Codec::Snappy),
            other => Err(FormatError::UnsupportedCodec(other)),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::None => f.write_str("none"),
            Codec::Snappy => f.write_str("snappy"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// BlockBuf
// ------------------------------------------------------------------------------------------------

/// The decoded bytes of one data block.
#[derive(Debug)]
pub(crate) enum BlockBuf {
    /// A validated range of the file itself.
    Mapped { start: usize, end: usize },

    /// A decompressed copy.
    Owned(Vec<u8>),
}

impl BlockBuf {
    /// Resolves the buffer against the file it was decoded from.
    ///
    /// `Mapped` ranges were bounds-checked at decode time against the same
    /// file, so the fallback to an empty slice is unreachable in practice.
    pub(crate) fn bytes<'a>(&'a self, file: &'a [u8]) -> &'a [u8] {
        match self {
            BlockBuf::Mapped { start, end } => file.get(*start..*end).unwrap_or(&[]),
            BlockBuf::Owned(buf) => buf,
        }
    }

    /// Returns `true` if decoding allocated a new buffer.
    pub(crate) fn is_owned(&self) -> bool {
        matches!(self, BlockBuf::Owned(_))
    }
}

// ------------------------------------------------------------------------------------------------
// Decoding
// ------------------------------------------------------------------------------------------------

fn corrupt(offset: u64, reason: String) -> FormatError {
    FormatError::CorruptBlock { offset, reason }
}

fn block_end(file: &[u8], what: &'static str, start: u64, len: u64) -> Result<u64, FormatError> {
    start.checked_add(len).ok_or(FormatError::OutOfBounds {
        what,
        start,
        end: u64::MAX,
        len: file.len(),
    })
}

/// Decodes the block at `offset` whose decompressed length the data index
/// declares as `size`.
///
/// # Errors
///
/// - [`FormatError::OutOfBounds`] if the block or its payload runs past the
///   end of `file`.
/// - [`FormatError::CorruptBlock`] if the Snappy header disagrees with
///   `size`, if `size` exceeds `max_block_size`, or if decompression fails.
pub(crate) fn decode_block(
    codec: Codec,
    file: &[u8],
    offset: u64,
    size: u32,
    max_block_size: u32,
) -> Result<BlockBuf, FormatError> {
    if size > max_block_size {
        return Err(corrupt(
            offset,
            format!("block size {size} exceeds limit {max_block_size}"),
        ));
    }

    match codec {
        Codec::None => {
            let end = block_end(file, "data block", offset, u64::from(size))?;
            slice_range(file, "data block", offset, end)?;
            Ok(BlockBuf::Mapped {
                start: len_to_usize(offset)?,
                end: len_to_usize(end)?,
            })
        }
        Codec::Snappy => {
            let header_end = block_end(file, "block header", offset, SNAPPY_HEADER_SIZE)?;
            let mut header = ByteReader::new(slice_range(file, "block header", offset, header_end)?);
            let uncompressed_size = header.read_u32()?;
            let compressed_size = header.read_u32()?;

            if uncompressed_size != size {
                return Err(corrupt(
                    offset,
                    format!("uncompressed size {uncompressed_size} != index size {size}"),
                ));
            }

            let payload_end =
                block_end(file, "compressed payload", header_end, u64::from(compressed_size))?;
            let payload = slice_range(file, "compressed payload", header_end, payload_end)?;

            let expected = len_to_usize(u64::from(size))?;
            let framed = decompress_len(payload)
                .map_err(|e| corrupt(offset, format!("snappy header: {e}")))?;
            if framed != expected {
                return Err(corrupt(
                    offset,
                    format!("snappy payload decodes to {framed} bytes, expected {expected}"),
                ));
            }

            let decompressed = Decoder::new()
                .decompress_vec(payload)
                .map_err(|e| corrupt(offset, format!("snappy: {e}")))?;
            if decompressed.len() != expected {
                return Err(corrupt(
                    offset,
                    format!(
                        "decompressed {} bytes, expected {expected}",
                        decompressed.len()
                    ),
                ));
            }

            Ok(BlockBuf::Owned(decompressed))
        }
    }
}

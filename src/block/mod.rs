//! Data blocks and the in-block scan engine.
//!
//! A [`DataBlock`] pairs the descriptor read from the data index (offset,
//! size, first key) with the block's decoded bytes and a **scan cursor**.
//! The cursor is the only mutable per-block state: lookups resume from it,
//! so a run of non-decreasing queries walks every block at most once.
//!
//! # Record layout
//!
//! ```text
//! DATABLK* [key_len u32][val_len u32][key][value] ...
//! ```
//!
//! Records are sorted ascending by key; duplicate keys form contiguous runs.
//!
//! # Cursor invariant
//!
//! After any scan for `target`, the cursor rests on the first record whose
//! key is `>= target` (or at the end of the block). A later scan for a key
//! `>= target` therefore sees every record it could match, and repeating a
//! lookup returns the same answer. Scanning for a smaller key requires an
//! explicit [`DataBlock::reset`].

pub mod codec;

#[cfg(test)]
mod tests;

use std::cmp::Ordering;

use tracing::trace;

use crate::encoding::{ByteReader, len_to_usize};
use crate::format::{DATA_BLOCK_MAGIC, FormatError, MAGIC_SIZE, Section, check_magic};

use codec::{BlockBuf, Codec, decode_block};

// ------------------------------------------------------------------------------------------------
// Scan mode
// ------------------------------------------------------------------------------------------------

/// How many matching records a scan collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Stop at the first record equal to the target.
    First,

    /// Collect the whole contiguous run of records equal to the target.
    All,
}

/// What a block needs from its reader to decode itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockContext<'a> {
    pub(crate) file: &'a [u8],
    pub(crate) codec: Codec,
    pub(crate) max_block_size: u32,
}

// ------------------------------------------------------------------------------------------------
// DataBlock
// ------------------------------------------------------------------------------------------------

/// One data block of the file.
#[derive(Debug)]
pub struct DataBlock {
    offset: u64,
    size: u32,
    first_key: Vec<u8>,
    buf: Option<BlockBuf>,
    cursor: usize,
}

impl DataBlock {
    /// Creates a descriptor whose bytes have not been decoded yet.
    pub(crate) fn new(offset: u64, size: u32, first_key: Vec<u8>) -> Self {
        Self {
            offset,
            size,
            first_key,
            buf: None,
            cursor: MAGIC_SIZE,
        }
    }

    /// File offset of the (possibly compressed) block.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Decompressed size declared by the data index.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// First key stored in the block.
    pub fn first_key(&self) -> &[u8] {
        &self.first_key
    }

    /// Returns `true` once the block bytes have been decoded and validated.
    pub fn is_loaded(&self) -> bool {
        self.buf.is_some()
    }

    /// Current scan position, relative to the start of the decoded block.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rewinds the scan cursor to the first record.
    pub fn reset(&mut self) {
        self.cursor = MAGIC_SIZE;
    }

    /// Decodes and validates the block bytes if that has not happened yet.
    ///
    /// Returns `true` if this call did the decoding. The decoded buffer is
    /// kept for the lifetime of the block; a loaded block is never decoded
    /// again.
    ///
    /// # Errors
    ///
    /// Codec errors from [`codec::decode_block`], [`FormatError::Truncated`]
    /// if the block cannot hold its magic, and [`FormatError::BadMagic`].
    pub(crate) fn load(&mut self, ctx: &BlockContext<'_>) -> Result<bool, FormatError> {
        if self.buf.is_some() {
            return Ok(false);
        }

        let buf = decode_block(ctx.codec, ctx.file, self.offset, self.size, ctx.max_block_size)?;
        let bytes = buf.bytes(ctx.file);
        if bytes.len() < MAGIC_SIZE {
            return Err(FormatError::Truncated(format!(
                "data block at offset {} ({} bytes)",
                self.offset,
                bytes.len()
            )));
        }
        let mut r = ByteReader::new(bytes);
        check_magic(Section::DataBlock, r.read_array()?, &DATA_BLOCK_MAGIC)?;

        trace!(
            offset = self.offset,
            size = self.size,
            owned = buf.is_owned(),
            "data block loaded"
        );

        self.buf = Some(buf);
        self.cursor = MAGIC_SIZE;
        Ok(true)
    }

    /// Scans forward from the cursor for records equal to `target`.
    ///
    /// Returns the matching values in file order: at most one in
    /// [`ScanMode::First`], the whole contiguous run in [`ScanMode::All`].
    /// An empty result means the block holds no such key at or after the
    /// cursor.
    ///
    /// The block is loaded first if necessary.
    ///
    /// # Errors
    ///
    /// [`FormatError::Truncated`] if a record runs past the end of the
    /// block, plus any error from [`DataBlock::load`].
    pub(crate) fn scan(
        &mut self,
        ctx: &BlockContext<'_>,
        target: &[u8],
        mode: ScanMode,
    ) -> Result<Vec<Vec<u8>>, FormatError> {
        self.load(ctx)?;
        let bytes = match &self.buf {
            Some(buf) => buf.bytes(ctx.file),
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        let mut pos = self.cursor;
        let mut run_start: Option<usize> = None;

        while pos < bytes.len() {
            let (key, value, next) = read_record(bytes, pos, self.offset)?;
            match target.cmp(key) {
                Ordering::Greater => {
                    pos = next;
                    self.cursor = next;
                }
                Ordering::Equal => {
                    if run_start.is_none() {
                        run_start = Some(pos);
                        self.cursor = pos;
                    }
                    out.push(value.to_vec());
                    if mode == ScanMode::First {
                        break;
                    }
                    pos = next;
                }
                Ordering::Less => {
                    if run_start.is_none() {
                        self.cursor = pos;
                    }
                    break;
                }
            }
        }

        trace!(
            offset = self.offset,
            cursor = self.cursor,
            matches = out.len(),
            ?mode,
            "block scan"
        );
        Ok(out)
    }
}

/// Reads the record starting at `pos`, returning `(key, value, next_pos)`.
fn read_record(
    bytes: &[u8],
    pos: usize,
    block_offset: u64,
) -> Result<(&[u8], &[u8], usize), FormatError> {
    let truncated = || {
        FormatError::Truncated(format!(
            "record at offset {pos} of data block {block_offset}"
        ))
    };

    let mut r = ByteReader::new(bytes.get(pos..).ok_or_else(truncated)?);
    let key_len = r.read_u32().map_err(|_| truncated())?;
    let val_len = r.read_u32().map_err(|_| truncated())?;
    let key = r
        .read_bytes(len_to_usize(u64::from(key_len))?)
        .map_err(|_| truncated())?;
    let value = r
        .read_bytes(len_to_usize(u64::from(val_len))?)
        .map_err(|_| truncated())?;
    Ok((key, value, pos + r.position()))
}

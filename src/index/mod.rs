//! The data index: one descriptor per data block, sorted by first key.
//!
//! # Layout
//!
//! ```text
//! IDXBLK)+ {offset u64, size u32, first_key_len uvarint, first_key} × N
//! ```
//!
//! The index spans `[trailer.data_index_offset, trailer.data_index_end())`.
//! The writer emits descriptors in ascending first-key order; the reader
//! trusts that order for its binary search and never re-sorts.

#[cfg(test)]
mod tests;

use tracing::{debug, warn};

use crate::BlockLoading;
use crate::block::codec::Codec;
use crate::block::{BlockContext, DataBlock};
use crate::encoding::ByteReader;
use crate::format::{DATA_INDEX_MAGIC, FormatError, Section, Trailer, check_magic, slice_range};

/// Ordered block descriptors for one file.
#[derive(Debug)]
pub struct DataIndex {
    blocks: Vec<DataBlock>,
}

impl DataIndex {
    /// Decodes the data index described by `trailer`.
    ///
    /// With [`BlockLoading::Eager`] every block is decompressed and its magic
    /// validated here, so a file that opens is fully readable. With
    /// [`BlockLoading::Lazy`] only the descriptors are decoded.
    ///
    /// # Errors
    ///
    /// - [`FormatError::UnsupportedCodec`] if the trailer's codec is unknown
    ///   (fatal for the whole file, even with no blocks).
    /// - [`FormatError::OutOfBounds`] if the index range is outside the file.
    /// - [`FormatError::BadMagic`] for the index magic or, when eager, any
    ///   block magic.
    /// - [`FormatError::Truncated`] if a descriptor is cut short.
    /// - Codec errors from eager block decoding.
    pub(crate) fn build(
        file: &[u8],
        trailer: &Trailer,
        loading: BlockLoading,
        max_block_size: u32,
    ) -> Result<Self, FormatError> {
        let codec = Codec::try_from(trailer.compression_codec)?;
        let ctx = BlockContext {
            file,
            codec,
            max_block_size,
        };

        let region = slice_range(
            file,
            "data index",
            trailer.data_index_offset,
            trailer.data_index_end(),
        )?;
        let mut r = ByteReader::new(region);
        check_magic(Section::DataIndex, r.read_array()?, &DATA_INDEX_MAGIC)?;

        let mut blocks: Vec<DataBlock> = Vec::new();
        while !r.is_empty() {
            let entry_pos = r.position();
            let truncated = || {
                FormatError::Truncated(format!(
                    "data index entry {} at index offset {entry_pos}",
                    blocks.len()
                ))
            };

            let offset = r.read_u64().map_err(|_| truncated())?;
            let size = r.read_u32().map_err(|_| truncated())?;
            let first_key = r.read_length_prefixed().map_err(|_| truncated())?;

            let mut block = DataBlock::new(offset, size, first_key.to_vec());
            if loading == BlockLoading::Eager {
                block.load(&ctx)?;
            }

            if blocks
                .last()
                .is_some_and(|prev| prev.first_key() > block.first_key())
            {
                warn!(
                    block = blocks.len(),
                    "data index out of order: first key sorts before previous block"
                );
            }

            blocks.push(block);
        }

        if blocks.len() != trailer.data_index_count as usize {
            warn!(
                decoded = blocks.len(),
                declared = trailer.data_index_count,
                "data index entry count differs from trailer"
            );
        }

        debug!(
            blocks = blocks.len(),
            %codec,
            ?loading,
            index_bytes = region.len(),
            "data index built"
        );

        Ok(Self { blocks })
    }

    /// Number of data blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the file has no data blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All blocks, in index order.
    pub fn blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    pub(crate) fn block(&self, i: usize) -> Option<&DataBlock> {
        self.blocks.get(i)
    }

    pub(crate) fn block_mut(&mut self, i: usize) -> Option<&mut DataBlock> {
        self.blocks.get_mut(i)
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [DataBlock] {
        &mut self.blocks
    }

    /// Number of blocks whose first key is `<= key` within `blocks[from..]`.
    ///
    /// This is the upper-bound position of `key` relative to `from`; the
    /// owning block is `from + n - 1` when `n > 0`.
    pub(crate) fn upper_bound_from(&self, from: usize, key: &[u8]) -> usize {
        match self.blocks.get(from..) {
            Some(tail) => tail.partition_point(|b| b.first_key() <= key),
            None => 0,
        }
    }
}

//! The fixed-size trailer that locates every other section of the file.

use crate::encoding::ByteReader;

use super::{
    FormatError, Section, TRAILER_MAGIC, TRAILER_OFFSET_FROM_END, TRAILER_SIZE, Version,
    check_magic,
};

/// The 56-byte metadata record preceding the version tag.
///
/// Offsets are not range-checked here; every consumer slices the file
/// through a bounds-checked helper instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// File offset of this trailer (`len - 60`).
    pub start: u64,

    /// Offset of the file-info block.
    pub file_info_offset: u64,

    /// Offset of the data index.
    pub data_index_offset: u64,

    /// Number of entries the writer recorded in the data index.
    pub data_index_count: u32,

    /// Offset of the meta index, or 0 if the file has none.
    pub meta_index_offset: u64,

    /// Number of meta index entries.
    pub meta_index_count: u32,

    /// Sum of the uncompressed sizes of every data block.
    pub total_uncompressed_data_bytes: u64,

    /// Total number of key/value records in the file.
    pub entry_count: u32,

    /// Compression codec id applied to every data block.
    pub compression_codec: u32,
}

impl Trailer {
    /// Decodes the trailer of `file`.
    ///
    /// `version` must already have been decoded from the same file; anything
    /// other than 1.0 is rejected before the trailer is touched.
    ///
    /// # Errors
    ///
    /// - [`FormatError::UnsupportedVersion`] if `version` is not 1.0.
    /// - [`FormatError::Truncated`] if the file is shorter than 60 bytes.
    /// - [`FormatError::BadMagic`] if the trailer magic does not match.
    pub fn decode(file: &[u8], version: &Version) -> Result<Self, FormatError> {
        version.ensure_supported()?;

        if file.len() < TRAILER_OFFSET_FROM_END {
            return Err(FormatError::Truncated(format!(
                "trailer: file of {} bytes",
                file.len()
            )));
        }

        let start = file.len() - TRAILER_OFFSET_FROM_END;
        let mut r = ByteReader::new(&file[start..start + TRAILER_SIZE]);

        check_magic(Section::Trailer, r.read_array()?, &TRAILER_MAGIC)?;

        Ok(Self {
            start: start as u64,
            file_info_offset: r.read_u64()?,
            data_index_offset: r.read_u64()?,
            data_index_count: r.read_u32()?,
            meta_index_offset: r.read_u64()?,
            meta_index_count: r.read_u32()?,
            total_uncompressed_data_bytes: r.read_u64()?,
            entry_count: r.read_u32()?,
            compression_codec: r.read_u32()?,
        })
    }

    /// End of the data index: the meta index if present, else the trailer.
    pub fn data_index_end(&self) -> u64 {
        if self.meta_index_offset != 0 {
            self.meta_index_offset
        } else {
            self.start
        }
    }
}

//! The public lookup surface.
//!
//! A [`Reader`] owns the file bytes, the decoded version and trailer, and the
//! data index. Lookups go through two steps:
//!
//! 1. **Block location** ([`Reader::block_for`]) picks the block whose first
//!    key is the greatest one `<= key`.
//! 2. **In-block scan** ([`DataBlock::scan`](crate::block::DataBlock))
//!    walks the block's records forward from its cursor.
//!
//! # Monotonic lookups
//!
//! The reader remembers the block it last used (`cur`) and the previous key.
//! While keys arrive in non-decreasing order and stay inside the current
//! block, no binary search runs and the block's cursor is not rewound, so a
//! sorted batch of lookups scans each block at most once. A key smaller than
//! the previous one rewinds the current block and block 0, then restarts the
//! search from the first block.

mod source;

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use crate::block::codec::Codec;
use crate::block::{BlockContext, DataBlock, ScanMode};
use crate::format::{Trailer, Version};
use crate::index::DataIndex;
use crate::{HFileError, ReaderConfig};

use source::Source;

// ------------------------------------------------------------------------------------------------
// Stats
// ------------------------------------------------------------------------------------------------

/// Counters describing how lookups were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// `get_first` and `get_all` calls.
    pub lookups: u64,

    /// Lookups that reused the current block without searching.
    pub fast_path_hits: u64,

    /// Lookups that binary-searched the data index.
    pub binary_searches: u64,

    /// Times a block cursor was rewound to its first record.
    pub block_resets: u64,

    /// Blocks decompressed and validated, at open or on first access.
    pub blocks_loaded: u64,
}

// ------------------------------------------------------------------------------------------------
// Reader
// ------------------------------------------------------------------------------------------------

/// A read-only HFile v1 reader.
///
/// # Thread safety
///
/// `Reader` is `Send` but lookups take `&mut self` because they move scan
/// cursors. Share one across threads behind a `Mutex`, or open one reader
/// per thread; the file itself is never modified.
pub struct Reader {
    source: Source,
    origin: String,
    version: Version,
    trailer: Trailer,
    codec: Codec,
    index: DataIndex,
    config: ReaderConfig,
    cur: usize,
    last_key: Option<Vec<u8>>,
    stats: ReaderStats,
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("origin", &self.origin)
            .field("version", &self.version)
            .field("blocks", &self.index.len())
            .field("cur", &self.cur)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hfile {} (v{}, {} blocks, {} entries, {})",
            self.origin,
            self.version,
            self.index.len(),
            self.trailer.entry_count,
            self.codec
        )
    }
}

impl Reader {
    /// Opens and memory-maps the file at `path` with the default
    /// configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HFileError> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Opens and memory-maps the file at `path`.
    ///
    /// # Overview
    ///
    /// 1. Map the whole file read-only.
    /// 2. Decode the version tag; only 1.0 is accepted.
    /// 3. Decode the trailer and check its magic.
    /// 4. Decode the data index; with [`BlockLoading::Eager`](crate::BlockLoading)
    ///    every block is decompressed and its magic checked.
    ///
    /// # Errors
    ///
    /// - [`HFileError::InvalidConfig`] if `config` is out of range.
    /// - [`HFileError::Io`] if the file cannot be opened or mapped.
    /// - [`HFileError::Format`] for any format violation.
    ///
    /// # Safety
    ///
    /// Uses `unsafe { Mmap::map(...) }`. The mapping is read-only and every
    /// range is bounds-checked before slicing; the caller must not truncate
    /// or rewrite the file while the reader is alive.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: ReaderConfig,
    ) -> Result<Self, HFileError> {
        config.validate()?;

        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        Self::from_source(Source::Mapped(mmap), path.display().to_string(), config)
    }

    /// Builds a reader over an in-memory copy of a file, with the default
    /// configuration.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, HFileError> {
        Self::from_bytes_with_config(bytes, ReaderConfig::default())
    }

    /// Builds a reader over an in-memory copy of a file.
    ///
    /// Behaves exactly like [`Reader::open_with_config`] minus the mapping.
    pub fn from_bytes_with_config(
        bytes: Vec<u8>,
        config: ReaderConfig,
    ) -> Result<Self, HFileError> {
        config.validate()?;
        Self::from_source(Source::Owned(bytes), "<memory>".to_string(), config)
    }

    fn from_source(
        source: Source,
        origin: String,
        config: ReaderConfig,
    ) -> Result<Self, HFileError> {
        let file: &[u8] = &source;

        let version = Version::decode(file)?;
        let trailer = Trailer::decode(file, &version)?;
        let codec = Codec::try_from(trailer.compression_codec)?;
        let index = DataIndex::build(file, &trailer, config.block_loading, config.max_block_size)?;

        let blocks_loaded = index.blocks().iter().filter(|b| b.is_loaded()).count() as u64;

        info!(
            origin = %origin,
            source = source.kind(),
            bytes = file.len(),
            %version,
            %codec,
            blocks = index.len(),
            entries = trailer.entry_count,
            "hfile opened"
        );

        Ok(Self {
            source,
            origin,
            version,
            trailer,
            codec,
            index,
            config,
            cur: 0,
            last_key: None,
            stats: ReaderStats {
                blocks_loaded,
                ..ReaderStats::default()
            },
        })
    }

    // --------------------------------------------------------------------------------------------
    // Lookups
    // --------------------------------------------------------------------------------------------

    /// Returns the first value stored under `key`, or `None` if the key is
    /// absent.
    ///
    /// A key that sorts before every block, or any key in a file with no
    /// data blocks, is reported as absent rather than as an error.
    ///
    /// # Errors
    ///
    /// [`HFileError::Format`] if the owning block is corrupt (a truncated
    /// record, or, with lazy loading, a block that fails to decode).
    pub fn get_first(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, HFileError> {
        Ok(self.lookup(key, ScanMode::First)?.into_iter().next())
    }

    /// Returns every value stored under `key` in the owning block, in file
    /// order. The result is empty if the key is absent.
    ///
    /// # Errors
    ///
    /// Same as [`Reader::get_first`].
    pub fn get_all(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>, HFileError> {
        self.lookup(key, ScanMode::All)
    }

    fn lookup(&mut self, key: &[u8], mode: ScanMode) -> Result<Vec<Vec<u8>>, HFileError> {
        self.stats.lookups += 1;

        let Some(i) = self.block_for(key) else {
            if self.config.warn_on_missing_block {
                warn!(key = %String::from_utf8_lossy(key), "no block for key");
            }
            return Ok(Vec::new());
        };

        let ctx = BlockContext {
            file: &self.source[..],
            codec: self.codec,
            max_block_size: self.config.max_block_size,
        };
        let Some(block) = self.index.block_mut(i) else {
            return Ok(Vec::new());
        };

        let was_loaded = block.is_loaded();
        let values = block.scan(&ctx, key, mode)?;
        if !was_loaded {
            self.stats.blocks_loaded += 1;
            debug!(block = i, offset = block.offset(), "data block loaded on first access");
        }
        Ok(values)
    }

    /// Selects the block that may hold `key` and returns its index.
    ///
    /// Returns `None` when `key` sorts before every block still eligible
    /// (or the file has no blocks).
    ///
    /// # Policy
    ///
    /// 1. If `key` is smaller than the previous key, rewind the current
    ///    block and block 0, and restart from block 0.
    /// 2. Keep the current block, without rewinding it, if its first key is
    ///    `>= key` or if it still owns `key` (the next block starts after
    ///    `key`).
    /// 3. Otherwise binary-search `[cur, len)` for the last block whose first
    ///    key is `<= key`, rewind it and make it current.
    pub(crate) fn block_for(&mut self, key: &[u8]) -> Option<usize> {
        let backward = self
            .last_key
            .as_deref()
            .is_some_and(|last| key < last);
        if backward {
            let from = self.cur;
            self.reset_block(from);
            if from != 0 {
                self.reset_block(0);
            }
            self.cur = 0;
            debug!(from, "backward key, restarting from first block");
        }

        match &mut self.last_key {
            Some(last) => {
                last.clear();
                last.extend_from_slice(key);
            }
            None => self.last_key = Some(key.to_vec()),
        }

        let current = self.index.block(self.cur)?;
        let next_first = self.index.block(self.cur + 1).map(DataBlock::first_key);
        let owns = current.first_key() <= key && next_first.is_none_or(|next| next > key);
        if current.first_key() >= key || owns {
            self.stats.fast_path_hits += 1;
            return Some(self.cur);
        }

        self.stats.binary_searches += 1;
        let n = self.index.upper_bound_from(self.cur, key);
        if n == 0 {
            return None;
        }

        self.cur += n - 1;
        self.reset_block(self.cur);
        debug!(block = self.cur, "block selected by binary search");
        Some(self.cur)
    }

    fn reset_block(&mut self, i: usize) {
        if let Some(block) = self.index.block_mut(i) {
            block.reset();
            self.stats.block_resets += 1;
        }
    }

    /// Forgets the previous key and rewinds every block.
    ///
    /// Lookups are correct in any order without this; calling it before a
    /// batch of unrelated keys just avoids carrying scan positions over.
    pub fn reset_scan(&mut self) {
        for block in self.index.blocks_mut() {
            block.reset();
        }
        self.stats.block_resets += self.index.len() as u64;
        self.cur = 0;
        self.last_key = None;
    }

    // --------------------------------------------------------------------------------------------
    // Metadata
    // --------------------------------------------------------------------------------------------

    /// Decoded version tag (always 1.0).
    pub fn version(&self) -> Version {
        self.version
    }

    /// Decoded trailer.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Compression codec of every data block.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Total number of records according to the trailer.
    pub fn entry_count(&self) -> u32 {
        self.trailer.entry_count
    }

    /// Number of data blocks.
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    /// All data blocks, in index order.
    pub fn blocks(&self) -> &[DataBlock] {
        self.index.blocks()
    }

    /// First key of each block, in index order.
    pub fn first_keys(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.index.blocks().iter().map(DataBlock::first_key)
    }

    /// Size of the underlying file in bytes.
    pub fn len_bytes(&self) -> usize {
        self.source.len()
    }

    /// Lookup counters since the reader was opened.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Writes entry and block counts plus each block's first key.
    ///
    /// Meant for tooling; the output format is not stable.
    pub fn write_debug_info<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "entries: {}", self.trailer.entry_count)?;
        writeln!(out, "blocks: {}", self.index.len())?;
        for (i, block) in self.index.blocks().iter().enumerate() {
            writeln!(
                out,
                "\t#{i}: {} ({:?})",
                String::from_utf8_lossy(block.first_key()),
                block.first_key()
            )?;
        }
        Ok(())
    }
}

//! # hfile
//!
//! A read-only reader for **HFile v1** containers: immutable, sorted,
//! block-indexed key-value files, optionally Snappy-compressed per block,
//! as written by big-table style storage engines.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hfile::Reader;
//!
//! let mut reader = Reader::open("/data/table.hfile").unwrap();
//!
//! // First value stored under a key
//! if let Some(value) = reader.get_first(b"row-0042").unwrap() {
//!     println!("{}", String::from_utf8_lossy(&value));
//! }
//!
//! // Every value stored under a duplicated key, in file order
//! let all = reader.get_all(b"row-0043").unwrap();
//! println!("{} values", all.len());
//! ```
//!
//! ## Features
//!
//! - **Memory-mapped**: the file is mapped read-only; uncompressed blocks
//!   are never copied.
//! - **Strict validation**: version tag, trailer, index and block magics,
//!   and compressed block framing are all checked before use.
//! - **Bounds-checked decoding**: a truncated or corrupt file yields a
//!   [`FormatError`], never a panic.
//! - **Monotonic lookups**: queries in non-decreasing key order reuse the
//!   current block and its scan position instead of searching again.
//!
//! ## Access pattern
//!
//! Lookups take `&mut self`: each [`Reader`] keeps a block cursor and the
//! previous key to make ascending lookups cheap. Lookups in any order are
//! correct; descending jumps just restart from the first block. Use one
//! reader per thread, or wrap a shared reader in a mutex.

pub mod block;
pub mod encoding;
pub mod format;
pub mod index;
mod reader;

use std::io;

use thiserror::Error;

pub use block::codec::Codec;
pub use block::{DataBlock, ScanMode};
pub use encoding::EncodingError;
pub use format::{FormatError, Section, Trailer, Version};
pub use index::DataIndex;
pub use reader::{Reader, ReaderStats};

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// When data blocks are decompressed and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockLoading {
    /// Decode every block while opening. Any corrupt block fails `open`.
    #[default]
    Eager,

    /// Decode a block on first access and keep the result. Corruption in a
    /// block surfaces from the lookup that first touches it.
    Lazy,
}

/// Configuration for a [`Reader`].
///
/// All fields have sensible defaults via [`ReaderConfig::default()`].
/// The configuration is validated when passed to [`Reader::open_with_config`]
/// or [`Reader::from_bytes_with_config`].
///
/// # Example
///
/// ```rust
/// use hfile::{BlockLoading, ReaderConfig};
///
/// let config = ReaderConfig {
///     block_loading: BlockLoading::Lazy,
///     ..ReaderConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Whether blocks are decoded at open time or on first access.
    ///
    /// Default: [`BlockLoading::Eager`].
    pub block_loading: BlockLoading,

    /// Largest decompressed block size accepted, in bytes.
    ///
    /// A data index entry declaring a larger block is treated as corrupt,
    /// which bounds the allocation a hostile file can trigger.
    ///
    /// Default: 256 MiB. Must be ≥ 8 (the block magic).
    pub max_block_size: u32,

    /// Emit a `warn` event when a lookup finds no block to scan (the file
    /// has no data blocks).
    ///
    /// Default: `true`.
    pub warn_on_missing_block: bool,
}

/// Default value of [`ReaderConfig::max_block_size`].
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 256 * 1024 * 1024;

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            block_loading: BlockLoading::Eager,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            warn_on_missing_block: true,
        }
    }
}

impl ReaderConfig {
    /// Validates all configuration parameters.
    fn validate(&self) -> Result<(), HFileError> {
        if (self.max_block_size as usize) < format::MAGIC_SIZE {
            return Err(HFileError::InvalidConfig(format!(
                "max_block_size must be >= {}",
                format::MAGIC_SIZE
            )));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`Reader`] operations.
#[derive(Debug, Error)]
pub enum HFileError {
    /// The file could not be opened or mapped.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration parameter.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The file is not a valid HFile v1.
    #[error("{0}")]
    Format(#[from] FormatError),
}

impl From<EncodingError> for HFileError {
    fn from(e: EncodingError) -> Self {
        HFileError::Format(FormatError::Encoding(e))
    }
}

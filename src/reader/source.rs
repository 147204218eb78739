//! The immutable byte view a [`Reader`](super::Reader) decodes from.

use std::ops::Deref;

use memmap2::Mmap;

/// Whole-file bytes, either memory-mapped or held in memory.
///
/// The reader owns its source for its entire lifetime; nothing ever
/// writes through it.
#[derive(Debug)]
pub(crate) enum Source {
    /// A read-only mapping of the file.
    Mapped(Mmap),

    /// A caller-supplied buffer.
    Owned(Vec<u8>),
}

impl Source {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Source::Mapped(_) => "mmap",
            Source::Owned(_) => "memory",
        }
    }
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Source::Mapped(mmap) => mmap,
            Source::Owned(buf) => buf,
        }
    }
}

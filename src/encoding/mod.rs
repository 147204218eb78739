//! Bounds-checked, big-endian decoding primitives for the HFile wire format.
//!
//! Every multi-byte integer in an HFile is **big-endian**. Lengths inside the
//! data index use an unsigned **base-128 varint** (little-endian groups of
//! seven bits, continuation flag in the high bit). Everything else is fixed
//! width.
//!
//! # Wire primitives
//!
//! | Rust type  | Encoding                                      |
//! |------------|-----------------------------------------------|
//! | `u32`      | 4 bytes, big-endian                           |
//! | `u64`      | 8 bytes, big-endian                           |
//! | `[u8; N]`  | `N` raw bytes (magic literals)                |
//! | uvarint    | 1–10 bytes, 7 bits per byte, LSB group first  |
//! | bytes      | `[uvarint len][bytes]` (index first keys)     |
//!
//! # Zero-panic guarantee
//!
//! The input is an untrusted file. No function in this module indexes a
//! slice without checking its length first; short input is reported as
//! [`EncodingError::UnexpectedEof`].
//!
//! ```rust,ignore
//! use hfile::encoding::ByteReader;
//!
//! let mut r = ByteReader::new(&bytes);
//! let offset = r.read_u64()?;
//! let size = r.read_u32()?;
//! ```


use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Limits
// ------------------------------------------------------------------------------------------------

/// Maximum number of bytes a 64-bit uvarint may occupy.
pub const MAX_VARINT_LEN: usize = 10;

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors produced while decoding primitive fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A uvarint ran past ten bytes or overflowed 64 bits.
    #[error("uvarint overflows u64")]
    VarintOverflow,

    /// A decoded length does not fit the platform's address space.
    #[error("length overflow: {0}")]
    LengthOverflow(String),
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// Verify that `buf` has at least `needed` bytes.
#[inline]
fn require(buf: &[u8], needed: usize) -> Result<(), EncodingError> {
    if buf.len() < needed {
        Err(EncodingError::UnexpectedEof {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Converts a wire length to `usize`.
#[inline]
pub fn len_to_usize(len: u64) -> Result<usize, EncodingError> {
    usize::try_from(len)
        .map_err(|_| EncodingError::LengthOverflow(format!("length {len} exceeds usize::MAX")))
}

/// Decodes a big-endian `u32` from the start of `buf`.
#[inline]
pub fn decode_u32_be(buf: &[u8]) -> Result<u32, EncodingError> {
    require(buf, 4)?;
    Ok(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Decodes a big-endian `u64` from the start of `buf`.
#[inline]
pub fn decode_u64_be(buf: &[u8]) -> Result<u64, EncodingError> {
    require(buf, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&buf[..8]);
    Ok(u64::from_be_bytes(arr))
}

/// Decodes an unsigned base-128 varint from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_uvarint(buf: &[u8]) -> Result<(u64, usize), EncodingError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(EncodingError::VarintOverflow);
        }
        // The tenth byte may only carry the final bit of a u64.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(EncodingError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(EncodingError::UnexpectedEof {
        needed: buf.len() + 1,
        available: buf.len(),
    })
}

/// Appends `value` as an unsigned base-128 varint.
///
/// Only the test fixtures write HFiles; the reader never encodes.
#[cfg(test)]
pub(crate) fn encode_uvarint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

// ------------------------------------------------------------------------------------------------
// ByteReader: forward-only cursor
// ------------------------------------------------------------------------------------------------

/// A forward-only cursor over a borrowed byte slice.
///
/// Each `read_*` call either consumes exactly the bytes it decodes or
/// fails without moving the cursor.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a cursor positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the underlying slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, EncodingError> {
        let v = decode_u32_be(self.rest())?;
        self.pos += 4;
        Ok(v)
    }

    /// Reads a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, EncodingError> {
        let v = decode_u64_be(self.rest())?;
        self.pos += 8;
        Ok(v)
    }

    /// Reads an unsigned base-128 varint.
    pub fn read_uvarint(&mut self) -> Result<u64, EncodingError> {
        let (v, n) = decode_uvarint(self.rest())?;
        self.pos += n;
        Ok(v)
    }

    /// Reads exactly `len` bytes, borrowing them from the underlying slice.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], EncodingError> {
        let rest = self.rest();
        require(rest, len)?;
        self.pos += len;
        Ok(&rest[..len])
    }

    /// Reads a fixed-size array, typically a magic literal.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], EncodingError> {
        let bytes = self.read_bytes(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    /// Reads a `[uvarint len][bytes]` field.
    pub fn read_length_prefixed(&mut self) -> Result<&'a [u8], EncodingError> {
        let start = self.pos;
        let len = len_to_usize(self.read_uvarint()?)?;
        match self.read_bytes(len) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }
}

//! The packed version tag stored in the last four bytes of the file.

use std::fmt;

use crate::encoding::decode_u32_be;

use super::{
    FormatError, SUPPORTED_MAJOR_VERSION, SUPPORTED_MINOR_VERSION, TRAILER_OFFSET_FROM_END,
    VERSION_SIZE,
};

/// HFile format version.
///
/// Stored as one big-endian `u32`: the low 24 bits are the major version,
/// the high 8 bits the minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Major version (24 bits).
    pub major: u32,

    /// Minor version (8 bits).
    pub minor: u32,
}

impl Version {
    /// Unpacks a raw version word.
    pub fn from_raw(raw: u32) -> Self {
        Self {
            major: raw & 0x00FF_FFFF,
            minor: raw >> 24,
        }
    }

    /// Packs the version back into its on-disk word.
    pub fn to_raw(self) -> u32 {
        (self.minor << 24) | (self.major & 0x00FF_FFFF)
    }

    /// Decodes the version tag from the end of `file` and rejects anything
    /// other than (1, 0).
    ///
    /// # Errors
    ///
    /// - [`FormatError::Truncated`] if `file` cannot hold a trailer and
    ///   version tag.
    /// - [`FormatError::UnsupportedVersion`] for any version other than 1.0.
    pub fn decode(file: &[u8]) -> Result<Self, FormatError> {
        if file.len() < TRAILER_OFFSET_FROM_END {
            return Err(FormatError::Truncated(format!(
                "file of {} bytes, need at least {TRAILER_OFFSET_FROM_END}",
                file.len()
            )));
        }

        let raw = decode_u32_be(&file[file.len() - VERSION_SIZE..])?;
        let version = Self::from_raw(raw);
        version.ensure_supported()?;
        Ok(version)
    }

    /// Returns `true` if this reader understands the version.
    pub fn is_supported(&self) -> bool {
        self.major == SUPPORTED_MAJOR_VERSION && self.minor == SUPPORTED_MINOR_VERSION
    }

    /// Fails with [`FormatError::UnsupportedVersion`] unless this is 1.0.
    pub fn ensure_supported(&self) -> Result<(), FormatError> {
        if !self.is_supported() {
            return Err(FormatError::UnsupportedVersion {
                major: self.major,
                minor: self.minor,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

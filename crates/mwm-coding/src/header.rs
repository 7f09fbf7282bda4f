use std::io::Write;

use crate::error::{CodingError, Result};
use crate::source::ArraySource;

/// Layout generations of the features (`dat`) section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DatVersion {
    V0 = 0,
}

impl DatVersion {
    pub const LATEST: DatVersion = DatVersion::V0;

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(DatVersion::V0),
            other => Err(CodingError::UnsupportedVersion(other)),
        }
    }
}

/// Leading record of the features section: where the feature records start
/// inside the section and how many bytes they span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatSectionHeader {
    pub version: DatVersion,
    pub features_offset: u32,
    pub features_size: u32,
}

impl DatSectionHeader {
    pub const SERIALIZED_SIZE: usize = 9;

    /// Writes version, offset, size in that order.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&[self.version as u8])?;
        w.write_all(&self.features_offset.to_le_bytes())?;
        w.write_all(&self.features_size.to_le_bytes())?;
        Ok(())
    }

    pub fn read(src: &mut ArraySource<'_>) -> Result<Self> {
        let version = DatVersion::from_u8(src.read_u8()?)?;
        let features_offset = src.read_u32_le()?;
        let features_size = src.read_u32_le()?;
        Ok(Self {
            version,
            features_offset,
            features_size,
        })
    }
}

//! Tagged section container.
//!
//! File layout: section payloads back to back, then the tag table
//! (varint entry count; per entry varint tag length, tag bytes, u64 LE
//! offset, u64 LE size), then the u64 LE offset of the table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
use memmap2::Mmap;

use crate::error::{CodingError, Result};
use crate::source::ArraySource;
use crate::varint::write_var_u32;

const TRAILER_LEN: usize = 8;

/// Immutable view over one section. Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct Section {
    data: Bytes,
}

impl Section {
    #[inline]
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cursor positioned at `offset` bytes into the section.
    #[inline]
    pub fn source_at(&self, offset: u32) -> Result<ArraySource<'_>> {
        ArraySource::at(&self.data, offset as usize)
    }

    /// Sub-section sharing the same storage.
    pub fn slice(&self, range: Range<usize>) -> Result<Section> {
        if range.start > range.end || range.end > self.data.len() {
            return Err(CodingError::InvalidData(format!(
                "range {range:?} outside section of {} bytes",
                self.data.len()
            )));
        }
        Ok(Section::new(self.data.slice(range)))
    }
}

/// Read side of the container: an mmap (or owned buffer) plus its tag table.
#[derive(Debug, Clone)]
pub struct FilesContainer {
    data: Bytes,
    entries: Vec<(String, Range<usize>)>,
}

impl FilesContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // The container is immutable once written; nobody truncates it while mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(Bytes::from_owner(mmap))
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();
        if data.len() < TRAILER_LEN {
            return Err(CodingError::InvalidData(format!(
                "container of {} bytes has no trailer",
                data.len()
            )));
        }

        let mut trailer = ArraySource::at(&data, data.len() - TRAILER_LEN)?;
        let table_offset = trailer.read_u64_le()? as usize;
        let table_end = data.len() - TRAILER_LEN;
        if table_offset > table_end {
            return Err(CodingError::InvalidData(format!(
                "tag table offset {table_offset} past end"
            )));
        }

        let mut src = ArraySource::new(&data[..table_end]);
        src.skip(table_offset)?;
        let count = src.read_var_u32()? as usize;
        let mut entries = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let tag = src.read_string()?.to_owned();
            let offset = src.read_u64_le()? as usize;
            let size = src.read_u64_le()? as usize;
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= table_offset)
                .ok_or_else(|| {
                    CodingError::InvalidData(format!("section {tag} out of bounds"))
                })?;
            entries.push((tag, offset..end));
        }

        Ok(Self { data, entries })
    }

    #[inline]
    pub fn has(&self, tag: &str) -> bool {
        self.entries.iter().any(|(t, _)| t == tag)
    }

    pub fn get(&self, tag: &str) -> Option<Section> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, r)| Section::new(self.data.slice(r.clone())))
    }

    pub fn section(&self, tag: &str) -> Result<Section> {
        self.get(tag)
            .ok_or_else(|| CodingError::MissingSection(tag.to_string()))
    }

    pub fn tags(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(t, r)| (t.as_str(), r.len()))
    }

    /// Total container size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write side of the container.
pub struct FilesContainerWriter<W: Write> {
    w: W,
    pos: u64,
    entries: Vec<(String, u64, u64)>,
}

impl FilesContainerWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::new(BufWriter::with_capacity(8 << 20, f)))
    }
}

impl<W: Write> FilesContainerWriter<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            pos: 0,
            entries: Vec::new(),
        }
    }

    pub fn write_section(&mut self, tag: &str, payload: &[u8]) -> Result<()> {
        if self.entries.iter().any(|(t, _, _)| t == tag) {
            return Err(CodingError::InvalidData(format!("duplicate section {tag}")));
        }
        self.w.write_all(payload)?;
        self.entries
            .push((tag.to_string(), self.pos, payload.len() as u64));
        self.pos += payload.len() as u64;
        Ok(())
    }

    /// Writes the tag table and trailer, returning the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let mut table = Vec::new();
        write_var_u32(&mut table, self.entries.len() as u32);
        for (tag, offset, size) in &self.entries {
            crate::source::write_string(&mut table, tag);
            table.extend_from_slice(&offset.to_le_bytes());
            table.extend_from_slice(&size.to_le_bytes());
        }
        self.w.write_all(&table)?;
        self.w.write_all(&self.pos.to_le_bytes())?;
        self.w.flush()?;
        Ok(self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> Vec<u8> {
        let mut w = FilesContainerWriter::new(Vec::new());
        w.write_section("header", &[1, 2, 3]).unwrap();
        w.write_section("dat", &[9; 10]).unwrap();
        w.write_section("empty", &[]).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn sections_are_found_by_tag() {
        let c = FilesContainer::from_bytes(build()).unwrap();
        assert_eq!(c.section("header").unwrap().as_bytes(), &[1, 2, 3]);
        assert_eq!(c.section("dat").unwrap().len(), 10);
        assert!(c.section("empty").unwrap().is_empty());
        assert!(matches!(
            c.section("geom0"),
            Err(CodingError::MissingSection(_))
        ));
        assert_eq!(c.tags().count(), 3);
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let mut w = FilesContainerWriter::new(Vec::new());
        w.write_section("dat", &[1]).unwrap();
        assert!(w.write_section("dat", &[2]).is_err());
    }

    #[test]
    fn corrupt_trailer_is_rejected() {
        let mut data = build();
        let n = data.len();
        data[n - 8..].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(FilesContainer::from_bytes(data).is_err());
        assert!(FilesContainer::from_bytes(vec![0u8; 3]).is_err());
    }

    #[test]
    fn mapped_file_matches_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.mwm");

        let mut w = FilesContainerWriter::create(&path).unwrap();
        w.write_section("dat", b"features").unwrap();
        w.finish().unwrap();

        let c = FilesContainer::open(&path).unwrap();
        assert_eq!(c.section("dat").unwrap().as_bytes(), b"features");
    }

    #[test]
    fn section_slices_share_storage() {
        let c = FilesContainer::from_bytes(build()).unwrap();
        let dat = c.section("dat").unwrap();
        assert_eq!(dat.slice(2..5).unwrap().len(), 3);
        assert!(dat.slice(5..11).is_err());
        assert_eq!(dat.source_at(10).unwrap().remaining().len(), 0);
        assert!(dat.source_at(11).is_err());
    }
}

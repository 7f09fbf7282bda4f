//! Sparse per-feature attributes (phone, website, opening hours, ...).
//!
//! `meta` holds one postcard-encoded list of `(kind, string id)` pairs per
//! feature behind an offset table; `metastr` is the deduplicated string
//! table the ids point into.

use std::fmt;

use mwm_coding::{CodingError, FilesContainer, Section};
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{FormatError, Result};
use crate::load_info::{write_offset_table, OffsetTable};

pub const META_TAG: &str = "meta";
pub const META_STRINGS_TAG: &str = "metastr";

macro_rules! meta_kinds {
    ($($variant:ident = $value:literal => $name:literal,)+) => {
        /// Attribute key, stored as one byte.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum MetaKind {
            $($variant = $value,)+
        }

        impl MetaKind {
            pub const ALL: &'static [MetaKind] = &[$(MetaKind::$variant,)+];

            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($value => Some(MetaKind::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(MetaKind::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(MetaKind::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

meta_kinds! {
    Cuisine = 1 => "cuisine",
    OpenHours = 2 => "opening_hours",
    Phone = 3 => "phone",
    Fax = 4 => "fax",
    Stars = 5 => "stars",
    Operator = 6 => "operator",
    Url = 7 => "url",
    Website = 8 => "website",
    Internet = 9 => "internet_access",
    Ele = 10 => "ele",
    TurnLanes = 11 => "turn_lanes",
    TurnLanesForward = 12 => "turn_lanes_forward",
    TurnLanesBackward = 13 => "turn_lanes_backward",
    Email = 14 => "email",
    Postcode = 15 => "postcode",
    Wikipedia = 16 => "wikipedia",
    Flats = 18 => "flats",
    Height = 19 => "height",
    MinHeight = 20 => "min_height",
    Denomination = 21 => "denomination",
    BuildingLevels = 22 => "building_levels",
    TestId = 23 => "test_id",
    Airport = 25 => "iata",
    Brand = 26 => "brand",
    Level = 27 => "level",
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attributes of one feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    values: FxHashMap<MetaKind, String>,
}

impl Metadata {
    #[inline]
    pub fn get(&self, kind: MetaKind) -> Option<&str> {
        self.values.get(&kind).map(String::as_str)
    }

    /// Empty values remove the key.
    pub fn set(&mut self, kind: MetaKind, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&kind);
        } else {
            self.values.insert(kind, value);
        }
    }

    #[inline]
    pub fn has(&self, kind: MetaKind) -> bool {
        self.values.contains_key(&kind)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries ordered by kind.
    pub fn iter(&self) -> impl Iterator<Item = (MetaKind, &str)> + '_ {
        let mut entries: Vec<_> = self.values.iter().map(|(k, v)| (*k, v.as_str())).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries.into_iter()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetaRecord {
    ids: Vec<(u8, u32)>,
}

/// Reader over the `meta` / `metastr` sections.
#[derive(Debug, Clone)]
pub struct MetadataDeserializer {
    records: OffsetTable,
    strings: OffsetTable,
}

impl MetadataDeserializer {
    /// `None` when the container carries no metadata at all.
    pub fn open(container: &FilesContainer) -> Result<Option<Self>> {
        match (container.get(META_TAG), container.get(META_STRINGS_TAG)) {
            (None, None) => Ok(None),
            (Some(meta), Some(strings)) => Ok(Some(Self::from_sections(meta, strings)?)),
            _ => Err(FormatError::corrupt_header(format!(
                "{META_TAG} and {META_STRINGS_TAG} must be present together"
            ))),
        }
    }

    pub fn from_sections(meta: Section, strings: Section) -> Result<Self> {
        Ok(Self {
            records: OffsetTable::open(meta, META_TAG)?,
            strings: OffsetTable::open(strings, META_STRINGS_TAG)?,
        })
    }

    /// Number of features with an entry.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }

    /// Raw `(kind, string id)` pairs of feature `index`; features past the
    /// table have none.
    pub fn get_ids(&self, index: u32) -> Result<Vec<(u8, u32)>> {
        if index as usize >= self.records.len() {
            return Ok(Vec::new());
        }
        let blob = self
            .records
            .range(index as usize)
            .and_then(|r| self.records.payload().get(r))
            .ok_or_else(|| FormatError::CorruptRecord {
                index,
                message: "metadata entry out of bounds".into(),
            })?;
        let record: MetaRecord = postcard::from_bytes(blob)?;
        Ok(record.ids)
    }

    pub fn get_meta_by_id(&self, id: u32) -> Result<String> {
        let bytes = self
            .strings
            .range(id as usize)
            .and_then(|r| self.strings.payload().get(r))
            .ok_or_else(|| {
                CodingError::InvalidData(format!("metadata string {id} out of bounds"))
            })?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| {
                FormatError::from(CodingError::InvalidData(format!(
                    "metadata string {id}: {e}"
                )))
            })
    }

    /// All attributes of feature `index`. Unknown kinds are skipped and a
    /// string that cannot be read leaves only its own key absent.
    pub fn get(&self, index: u32) -> Result<Metadata> {
        let mut meta = Metadata::default();
        for (kind, id) in self.get_ids(index)? {
            let Some(kind) = MetaKind::from_u8(kind) else {
                debug!(index, kind, "skipping unknown metadata kind");
                continue;
            };
            match self.get_meta_by_id(id) {
                Ok(value) => meta.set(kind, value),
                Err(e) => error!(index, kind = %kind, id, error = %e, "cannot read metadata value"),
            }
        }
        Ok(meta)
    }
}

/// Builds the `meta` / `metastr` payloads, one entry per feature in order.
#[derive(Debug)]
pub struct MetadataWriter {
    blobs: Vec<u8>,
    boundaries: Vec<u32>,
    strings: Vec<u8>,
    string_boundaries: Vec<u32>,
    string_ids: FxHashMap<String, u32>,
}

impl Default for MetadataWriter {
    fn default() -> Self {
        Self {
            blobs: Vec::new(),
            boundaries: vec![0],
            strings: Vec::new(),
            string_boundaries: vec![0],
            string_ids: FxHashMap::with_hasher(FxBuildHasher),
        }
    }
}

impl MetadataWriter {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = (self.string_boundaries.len() - 1) as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.string_boundaries.push(self.strings.len() as u32);
        self.string_ids.insert(s.to_owned(), id);
        id
    }

    pub fn add_feature(&mut self, meta: &Metadata) -> Result<()> {
        let ids = meta
            .iter()
            .map(|(kind, value)| (kind as u8, self.intern(value)))
            .collect();
        let blob = postcard::to_allocvec(&MetaRecord { ids })?;
        self.blobs.extend_from_slice(&blob);
        self.boundaries.push(self.blobs.len() as u32);
        Ok(())
    }

    /// Distinct strings stored so far.
    pub fn strings_count(&self) -> usize {
        self.string_ids.len()
    }

    /// `(meta, metastr)` section payloads.
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        let mut meta = Vec::with_capacity(self.blobs.len() + 4 * self.boundaries.len() + 4);
        write_offset_table(&mut meta, &self.boundaries);
        meta.extend_from_slice(&self.blobs);

        let mut strings =
            Vec::with_capacity(self.strings.len() + 4 * self.string_boundaries.len() + 4);
        write_offset_table(&mut strings, &self.string_boundaries);
        strings.extend_from_slice(&self.strings);
        (meta, strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwm_coding::FilesContainerWriter;

    fn deserializer(features: &[Metadata]) -> MetadataDeserializer {
        let mut w = MetadataWriter::default();
        for m in features {
            w.add_feature(m).unwrap();
        }
        let (meta, strings) = w.finish();
        MetadataDeserializer::from_sections(Section::new(meta.into()), Section::new(strings.into()))
            .unwrap()
    }

    #[test]
    fn kinds_are_stable() {
        for &k in MetaKind::ALL {
            assert_eq!(MetaKind::from_u8(k as u8), Some(k));
            assert_eq!(MetaKind::from_name(k.name()), Some(k));
        }
        assert_eq!(MetaKind::from_u8(0), None);
        assert_eq!(MetaKind::from_u8(17), None);
    }

    #[test]
    fn strings_are_shared_between_features() {
        let mut a = Metadata::default();
        a.set(MetaKind::Phone, "+44 20 7946 0000");
        a.set(MetaKind::Cuisine, "pizza");
        let mut b = Metadata::default();
        b.set(MetaKind::Cuisine, "pizza");

        let mut w = MetadataWriter::default();
        w.add_feature(&a).unwrap();
        w.add_feature(&Metadata::default()).unwrap();
        w.add_feature(&b).unwrap();
        assert_eq!(w.strings_count(), 2);

        let d = deserializer(&[a.clone(), Metadata::default(), b.clone()]);
        assert_eq!(d.len(), 3);
        assert_eq!(d.get(0).unwrap(), a);
        assert!(d.get(1).unwrap().is_empty());
        assert_eq!(d.get(2).unwrap().get(MetaKind::Cuisine), Some("pizza"));
        assert_eq!(d.get_ids(0).unwrap()[0].1, d.get_ids(2).unwrap()[0].1);
        assert!(d.get(7).unwrap().is_empty());
    }

    #[test]
    fn empty_value_removes_key() {
        let mut m = Metadata::default();
        m.set(MetaKind::Website, "https://example.org");
        assert!(m.has(MetaKind::Website));
        m.set(MetaKind::Website, "");
        assert!(!m.has(MetaKind::Website));
    }

    #[test]
    fn dangling_string_id_is_an_error() {
        let d = deserializer(&[]);
        assert!(d.get_meta_by_id(0).is_err());
    }

    #[test]
    fn dangling_string_drops_only_its_key() {
        let mut meta = Vec::new();
        let blob = postcard::to_allocvec(&MetaRecord {
            ids: vec![(MetaKind::Cuisine as u8, 0), (MetaKind::Phone as u8, 9)],
        })
        .unwrap();
        write_offset_table(&mut meta, &[0, blob.len() as u32]);
        meta.extend_from_slice(&blob);
        let mut strings = Vec::new();
        write_offset_table(&mut strings, &[0, 5]);
        strings.extend_from_slice(b"pizza");

        let d = MetadataDeserializer::from_sections(
            Section::new(meta.into()),
            Section::new(strings.into()),
        )
        .unwrap();
        let m = d.get(0).unwrap();
        assert_eq!(m.get(MetaKind::Cuisine), Some("pizza"));
        assert!(!m.has(MetaKind::Phone));
        assert!(matches!(
            d.get_meta_by_id(9),
            Err(FormatError::Coding(CodingError::InvalidData(_)))
        ));
    }

    #[test]
    fn half_present_sections_are_rejected() {
        let mut w = FilesContainerWriter::new(Vec::new());
        w.write_section(META_TAG, &[0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let c = FilesContainer::from_bytes(w.finish().unwrap()).unwrap();
        assert!(MetadataDeserializer::open(&c).is_err());
    }
}

//! Per-container state shared by every feature decoder.
//!
//! Sections read here:
//! - `header`: version, default coord bits, base point, scale thresholds and
//!   per-scale coord bits;
//! - `dat`: [`DatSectionHeader`] followed by the feature records;
//! - `offs`: record boundaries inside `dat`;
//! - `geom<i>` / `trg<i>`: outer lines and outer triangles of scale bucket `i`;
//! - `meta` / `metastr`: optional, see [`MetadataDeserializer`].

use std::ops::Range;

use mwm_coding::source::ArraySource;
use mwm_coding::{CodingError, CodingParams, DatSectionHeader, DatVersion, FilesContainer, PointU, Section};
use tracing::debug;

use crate::classifier::ClassifierRegistry;
use crate::error::{FormatError, Result};
use crate::feature::decoder::FeatureDecoder;
use crate::feature::geometry::MAX_SCALES_COUNT;
use crate::feature::FeatureId;
use crate::metadata::MetadataDeserializer;

pub const HEADER_TAG: &str = "header";
pub const FEATURES_TAG: &str = "dat";
pub const OFFSETS_TAG: &str = "offs";

pub fn geometry_tag(scale_index: usize) -> String {
    format!("geom{scale_index}")
}

pub fn triangles_tag(scale_index: usize) -> String {
    format!("trg{scale_index}")
}

/// Table of `count + 1` little-endian u32 boundaries preceded by `count`;
/// entry `i` spans `offsets[i]..offsets[i + 1]`.
#[derive(Debug, Clone, Default)]
pub(crate) struct OffsetTable {
    section: Section,
    count: usize,
}

impl OffsetTable {
    pub(crate) fn open(section: Section, tag: &str) -> Result<Self> {
        let count = ArraySource::new(section.as_bytes())
            .read_u32_le()
            .map_err(|_| FormatError::corrupt_header(format!("{tag}: no entry count")))?
            as usize;
        let table_len = count
            .checked_add(1)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(4));
        match table_len {
            Some(n) if n <= section.len() => Ok(Self { section, count }),
            _ => Err(FormatError::corrupt_header(format!(
                "{tag}: {count} entries do not fit {} bytes",
                section.len()
            ))),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    fn boundary(&self, i: usize) -> Option<usize> {
        ArraySource::at(self.section.as_bytes(), 4 + 4 * i)
            .and_then(|mut src| src.read_u32_le())
            .ok()
            .map(|v| v as usize)
    }

    /// `None` past the end or when the boundaries are out of order.
    pub(crate) fn range(&self, i: usize) -> Option<Range<usize>> {
        if i >= self.count {
            return None;
        }
        let start = self.boundary(i)?;
        let end = self.boundary(i + 1)?;
        (start <= end).then_some(start..end)
    }

    /// Bytes following the table.
    pub(crate) fn payload(&self) -> &[u8] {
        let start = 4 + 4 * (self.count + 1);
        &self.section.as_bytes()[start..]
    }
}

/// Counterpart of [`OffsetTable::open`]; `boundaries` holds `count + 1` values.
pub(crate) fn write_offset_table(out: &mut Vec<u8>, boundaries: &[u32]) {
    debug_assert!(!boundaries.is_empty());
    out.extend_from_slice(&((boundaries.len() - 1) as u32).to_le_bytes());
    for b in boundaries {
        out.extend_from_slice(&b.to_le_bytes());
    }
}

/// Random access to the feature records of a container.
#[derive(Debug, Clone)]
pub struct FeaturesVector {
    records: Section,
    offsets: OffsetTable,
}

impl FeaturesVector {
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.len() == 0
    }

    /// Record bytes of feature `index`.
    pub fn get(&self, index: u32) -> Result<&[u8]> {
        self.offsets
            .range(index as usize)
            .and_then(|r| self.records.as_bytes().get(r))
            .ok_or_else(|| FormatError::CorruptRecord {
                index,
                message: format!("no record bounds (features: {})", self.len()),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, Result<&[u8]>)> + '_ {
        (0..self.len() as u32).map(move |i| (FeatureId(i), self.get(i)))
    }
}

/// Immutable context of one opened container: scale buckets, coding
/// params, section handles and the optional metadata deserializer.
#[derive(Debug, Clone)]
pub struct ContainerMetadata {
    version: DatVersion,
    dat_header: DatSectionHeader,
    def_cp: CodingParams,
    scales: Vec<i32>,
    scale_cps: Vec<CodingParams>,
    features: FeaturesVector,
    geometry: Vec<Section>,
    triangles: Vec<Section>,
    meta: Option<MetadataDeserializer>,
}

fn header_err(what: &str) -> impl FnOnce(CodingError) -> FormatError + '_ {
    move |e| FormatError::corrupt_header(format!("{what}: {e}"))
}

fn check_coord_bits(bits: u8, what: &str) -> Result<u8> {
    if (1..=mwm_coding::point_coding::MAX_COORD_BITS).contains(&bits) {
        Ok(bits)
    } else {
        Err(FormatError::corrupt_header(format!("{what}: coord bits {bits}")))
    }
}

fn check_version(found: u8, supported: DatVersion) -> Result<DatVersion> {
    if found > supported as u8 {
        return Err(FormatError::UnsupportedVersion {
            found,
            supported: supported as u8,
        });
    }
    DatVersion::from_u8(found).map_err(|_| FormatError::UnsupportedVersion {
        found,
        supported: supported as u8,
    })
}

fn mandatory(container: &FilesContainer, tag: &str) -> Result<Section> {
    container
        .get(tag)
        .ok_or_else(|| FormatError::corrupt_header(format!("missing section {tag}")))
}

impl ContainerMetadata {
    /// Validates the header sections of `container`. Records themselves are
    /// not touched.
    pub fn open(container: &FilesContainer, supported: DatVersion) -> Result<Self> {
        let header = mandatory(container, HEADER_TAG)?;
        let mut src = ArraySource::new(header.as_bytes());

        let version = check_version(src.read_u8().map_err(header_err("version"))?, supported)?;
        let coord_bits = check_coord_bits(src.read_u8().map_err(header_err("coord bits"))?, "default")?;
        let base_x = src.read_var_u32().map_err(header_err("base point"))?;
        let base_y = src.read_var_u32().map_err(header_err("base point"))?;
        let def_cp = CodingParams::new(coord_bits, PointU::new(base_x, base_y));

        let count = src.read_u8().map_err(header_err("scale count"))? as usize;
        if count == 0 || count > MAX_SCALES_COUNT {
            return Err(FormatError::corrupt_header(format!("{count} scale buckets")));
        }
        let raw_scales = src.read_bytes(count).map_err(header_err("scales"))?;
        let scales: Vec<i32> = raw_scales.iter().map(|&s| s as i32).collect();
        if scales.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FormatError::corrupt_header(format!(
                "scales {scales:?} not strictly increasing"
            )));
        }
        let base_d = def_cp.to_d(def_cp.base_point());
        let scale_cps = src
            .read_bytes(count)
            .map_err(header_err("scale coord bits"))?
            .iter()
            .enumerate()
            .map(|(i, &bits)| {
                let bits = check_coord_bits(bits, &format!("scale {i}"))?;
                Ok(CodingParams::new(bits, PointU::default()).with_base_point(base_d))
            })
            .collect::<Result<Vec<_>>>()?;

        let dat = mandatory(container, FEATURES_TAG)?;
        let dat_header = DatSectionHeader::read(&mut ArraySource::new(dat.as_bytes())).map_err(
            |e| match e {
                CodingError::UnsupportedVersion(found) => FormatError::UnsupportedVersion {
                    found,
                    supported: supported as u8,
                },
                other => FormatError::corrupt_header(format!("dat header: {other}")),
            },
        )?;
        check_version(dat_header.version as u8, supported)?;
        let start = dat_header.features_offset as usize;
        let records = dat
            .slice(start..start + dat_header.features_size as usize)
            .map_err(header_err("features range"))?;
        let offsets = OffsetTable::open(mandatory(container, OFFSETS_TAG)?, OFFSETS_TAG)?;

        let geometry = (0..count)
            .map(|i| container.get(&geometry_tag(i)).unwrap_or_default())
            .collect();
        let triangles = (0..count)
            .map(|i| container.get(&triangles_tag(i)).unwrap_or_default())
            .collect();
        let meta = MetadataDeserializer::open(container)?;

        debug!(
            version = ?version,
            scales = ?scales,
            features = offsets.len(),
            metadata = meta.is_some(),
            "container opened"
        );

        Ok(Self {
            version,
            dat_header,
            def_cp,
            scales,
            scale_cps,
            features: FeaturesVector { records, offsets },
            geometry,
            triangles,
            meta,
        })
    }

    #[inline]
    pub fn version(&self) -> DatVersion {
        self.version
    }

    #[inline]
    pub fn dat_header(&self) -> &DatSectionHeader {
        &self.dat_header
    }

    #[inline]
    pub fn scale_count(&self) -> usize {
        self.scales.len()
    }

    /// Threshold of bucket `i`. Callers pass `i < scale_count()`.
    #[inline]
    pub fn scale_at(&self, i: usize) -> i32 {
        self.scales[i]
    }

    #[inline]
    pub fn last_scale(&self) -> i32 {
        self.scales[self.scales.len() - 1]
    }

    #[inline]
    pub fn scales(&self) -> &[i32] {
        &self.scales
    }

    #[inline]
    pub fn def_coding_params(&self) -> CodingParams {
        self.def_cp
    }

    /// Coding params of bucket `i`, based at the container's base point.
    pub fn coding_params(&self, i: usize) -> CodingParams {
        self.scale_cps.get(i).copied().unwrap_or(self.def_cp)
    }

    #[inline]
    pub fn geometry_reader(&self, i: usize) -> Option<&Section> {
        self.geometry.get(i)
    }

    #[inline]
    pub fn triangles_reader(&self, i: usize) -> Option<&Section> {
        self.triangles.get(i)
    }

    #[inline]
    pub fn features(&self) -> &FeaturesVector {
        &self.features
    }

    #[inline]
    pub fn meta_deserializer(&self) -> Option<&MetadataDeserializer> {
        self.meta.as_ref()
    }

    /// Decoder over record `index`.
    pub fn decoder<'a>(
        &'a self,
        index: u32,
        registry: &'a ClassifierRegistry,
    ) -> Result<FeatureDecoder<'a>> {
        let record = self.features.get(index)?;
        FeatureDecoder::new(FeatureId(index), record, self, registry)
    }
}

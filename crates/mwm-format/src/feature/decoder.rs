//! Lazy, staged decoding of one feature record.
//!
//! Record layout: header byte, one varint type index per type, the common
//! params the header declares, then either the centre point (points) or the
//! header2 block (lines and areas). Every stage is parsed at most once and
//! cached; geometry is pinned to the scale of the first request.

use std::fmt::Write as _;

use mwm_coding::serial::{
    load_inner_path, load_inner_triangles, load_outer_path, load_outer_triangles, load_point,
};
use mwm_coding::source::ArraySource;
use mwm_coding::{BitReader, CodingError, PointD, RectD};
use tracing::{error, warn};

use crate::classifier::ClassifierRegistry;
use crate::error::{FormatError, Result};
use crate::load_info::ContainerMetadata;
use crate::metadata::{MetaKind, Metadata};
use crate::type_path::PackedType;

use super::geometry::{
    filter_inner_points, inner_scale_index, mask_bytes_count, outer_scale_index, GeomOffset,
    GeometryOffsets, ScaleRequest,
};
use super::names::MultilangNames;
use super::params::{rank_to_population, FeatureParams};
use super::{FeatureId, GeomType, HeaderGeomType, TypesHolder, HEADER_MASK_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Stage {
    Types = 1 << 0,
    Common = 1 << 1,
    Header2 = 1 << 2,
    Geometry = 1 << 3,
    Triangles = 1 << 4,
    Metadata = 1 << 5,
    MetaIds = 1 << 6,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ParsedFlags(u8);

impl ParsedFlags {
    #[inline]
    fn contains(self, stage: Stage) -> bool {
        self.0 & stage as u8 != 0
    }

    #[inline]
    fn insert(&mut self, stage: Stage) {
        self.0 |= stage as u8;
    }
}

/// Geometry layout found in header2.
#[derive(Debug, Clone, Default)]
enum Header2 {
    #[default]
    Point,
    InnerLine { points: Vec<PointD>, mask: u32 },
    OuterLine { first: PointD, offsets: GeometryOffsets },
    InnerArea { triangles: Vec<PointD> },
    OuterArea { offsets: GeometryOffsets },
}

/// Byte size and element count of the outer geometry of each scale bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeomStat {
    pub sizes: Vec<u32>,
    pub elements: Vec<u32>,
}

/// Decoder over one borrowed record.
///
/// Accessors never fail: a record that turns out to be truncated past the
/// header is logged once per stage and the affected fields stay empty.
pub struct FeatureDecoder<'a> {
    id: FeatureId,
    record: &'a [u8],
    info: &'a ContainerMetadata,
    registry: &'a ClassifierRegistry,
    header: u8,

    parsed: ParsedFlags,
    corrupt: bool,
    reads: u32,

    types_end: usize,
    common_end: usize,

    types: Vec<PackedType>,
    params: FeatureParams,
    center: PointD,
    header2: Header2,
    points: Vec<PointD>,
    triangles: Vec<PointD>,
    limit_rect: RectD,
    metadata: Metadata,
    meta_ids: Vec<(u8, u32)>,
    /// Kinds whose string could not be read, by `MetaKind` bit.
    meta_failed: u32,
}

impl<'a> FeatureDecoder<'a> {
    /// Checks only what the header byte promises about the record length.
    pub fn new(
        id: FeatureId,
        record: &'a [u8],
        info: &'a ContainerMetadata,
        registry: &'a ClassifierRegistry,
    ) -> Result<Self> {
        let Some(&header) = record.first() else {
            return Err(FormatError::CorruptRecord {
                index: id.0,
                message: "empty record".into(),
            });
        };
        let types_count = (header & HEADER_MASK_TYPE) as usize + 1;
        if record.len() < 1 + types_count {
            return Err(FormatError::CorruptRecord {
                index: id.0,
                message: format!(
                    "{} bytes cannot hold {types_count} type indices",
                    record.len()
                ),
            });
        }

        Ok(Self {
            id,
            record,
            info,
            registry,
            header,
            parsed: ParsedFlags::default(),
            corrupt: false,
            reads: 0,
            types_end: 1,
            common_end: 1,
            types: Vec::with_capacity(types_count),
            params: FeatureParams::default(),
            center: PointD::default(),
            header2: Header2::default(),
            points: Vec::new(),
            triangles: Vec::new(),
            limit_rect: RectD::empty(),
            metadata: Metadata::default(),
            meta_ids: Vec::new(),
            meta_failed: 0,
        })
    }

    fn run_stage(&mut self, stage: Stage, parse: impl FnOnce(&mut Self) -> Result<()>) {
        if self.parsed.contains(stage) {
            return;
        }
        self.parsed.insert(stage);
        if let Err(e) = parse(self) {
            self.corrupt = true;
            warn!(feature = %self.id, stage = ?stage, error = %e, "degraded feature record");
        }
    }

    fn record_at(&mut self, pos: usize) -> std::result::Result<ArraySource<'a>, CodingError> {
        self.reads += 1;
        ArraySource::at(self.record, pos)
    }

    pub fn parse_types(&mut self) {
        self.run_stage(Stage::Types, |d| {
            let count = (d.header & HEADER_MASK_TYPE) as usize + 1;
            let mut src = d.record_at(1)?;
            for _ in 0..count {
                let index = src.read_var_u32()?;
                let t = match d.registry.try_type_for_index(index) {
                    Some(t) => t,
                    None => {
                        warn!(feature = %d.id, index, "unknown type index, using stub type");
                        d.registry.stub_type()
                    }
                };
                d.types.push(t);
            }
            d.types_end = src.pos();
            Ok(())
        });
    }

    pub fn parse_common(&mut self) {
        self.parse_types();
        self.run_stage(Stage::Common, |d| {
            if d.corrupt {
                return Err(FormatError::InvalidFeature("types unreadable".into()));
            }
            let mut src = d.record_at(d.types_end)?;
            d.params = FeatureParams::read(&mut src, d.header)?;
            if d.geom_type() == GeomType::Point {
                d.center = load_point(&mut src, &d.info.def_coding_params())?;
                d.limit_rect = RectD::from_point(d.center);
            }
            d.common_end = src.pos();
            Ok(())
        });
    }

    pub fn parse_header2(&mut self) {
        self.parse_common();
        self.run_stage(Stage::Header2, |d| {
            if d.corrupt {
                return Err(FormatError::InvalidFeature("common params unreadable".into()));
            }
            let geom = d.geom_type();
            if geom == GeomType::Point {
                return Ok(());
            }
            d.reads += 1;
            let mut bits = BitReader::at(d.record, d.common_end);
            let elems = bits.read_bits(4)? as usize;
            let mask = if elems == 0 { bits.read_bits(4)? } else { 0 };
            let mut src = ArraySource::at(d.record, bits.align_to_byte())?;
            let cp = d.info.def_coding_params();
            let scales = d.info.scale_count();

            d.header2 = match (geom, elems) {
                (GeomType::Line, 0) => {
                    let first = load_point(&mut src, &cp)?;
                    let offsets = GeometryOffsets::read(&mut src, mask, scales)?;
                    Header2::OuterLine { first, offsets }
                }
                (GeomType::Line, 1) => {
                    return Err(FormatError::InvalidFeature("inline line of 1 point".into()))
                }
                (GeomType::Line, n) => {
                    let mut point_mask = 0u32;
                    for (i, b) in src.read_bytes(mask_bytes_count(n))?.iter().enumerate() {
                        point_mask |= (*b as u32) << (8 * i);
                    }
                    let mut points = Vec::with_capacity(n);
                    load_inner_path(&mut src, n, &cp, &mut points)?;
                    Header2::InnerLine {
                        points,
                        mask: point_mask,
                    }
                }
                (GeomType::Area, 0) => Header2::OuterArea {
                    offsets: GeometryOffsets::read(&mut src, mask, scales)?,
                },
                (_, n) => {
                    let mut triangles = Vec::with_capacity(n * 3);
                    load_inner_triangles(&mut src, n + 2, &cp, &mut triangles)?;
                    Header2::InnerArea { triangles }
                }
            };
            Ok(())
        });
    }

    /// Line geometry at `scale`. The first call pins the geometry; later
    /// requests return the pinned points whatever their scale.
    pub fn parse_geometry(&mut self, scale: impl Into<ScaleRequest>) {
        let req = scale.into();
        self.parse_header2();
        self.run_stage(Stage::Geometry, |d| {
            let points = match &d.header2 {
                Header2::InnerLine { points, mask } => {
                    let idx = inner_scale_index(d.info.scales(), req);
                    filter_inner_points(points, *mask, idx)
                }
                Header2::OuterLine { first, offsets } => {
                    let first = *first;
                    d.limit_rect = RectD::from_point(first);
                    match outer_scale_index(d.info.scales(), req, offsets) {
                        Some(i) => {
                            let GeomOffset::Real(offset) = offsets.get(i) else {
                                return Ok(());
                            };
                            d.read_outer_line(i, offset, first)?
                        }
                        None => return Ok(()),
                    }
                }
                _ => return Ok(()),
            };
            d.limit_rect = RectD::from_points(&points);
            d.points = points;
            Ok(())
        });
    }

    /// Area geometry at `scale` as a flat triangle list; pinned like
    /// [`FeatureDecoder::parse_geometry`].
    pub fn parse_triangles(&mut self, scale: impl Into<ScaleRequest>) {
        let req = scale.into();
        self.parse_header2();
        self.run_stage(Stage::Triangles, |d| {
            let triangles = match &d.header2 {
                Header2::InnerArea { triangles } => triangles.clone(),
                Header2::OuterArea { offsets } => {
                    d.limit_rect = RectD::new(0.0, 0.0, 0.0, 0.0);
                    match outer_scale_index(d.info.scales(), req, offsets) {
                        Some(i) => {
                            let GeomOffset::Real(offset) = offsets.get(i) else {
                                return Ok(());
                            };
                            d.read_outer_triangles(i, offset)?
                        }
                        None => return Ok(()),
                    }
                }
                _ => return Ok(()),
            };
            d.limit_rect = RectD::from_points(&triangles);
            d.triangles = triangles;
            Ok(())
        });
    }

    fn read_outer_line(&mut self, i: usize, offset: u32, first: PointD) -> Result<Vec<PointD>> {
        self.reads += 1;
        let section = self.info.geometry_reader(i).ok_or_else(|| {
            FormatError::InvalidFeature(format!("no geometry section for scale {i}"))
        })?;
        let cp = self.info.coding_params(i).with_base_point(first);
        let mut points = vec![first];
        load_outer_path(&mut section.source_at(offset)?, &cp, &mut points)?;
        Ok(points)
    }

    fn read_outer_triangles(&mut self, i: usize, offset: u32) -> Result<Vec<PointD>> {
        self.reads += 1;
        let section = self.info.triangles_reader(i).ok_or_else(|| {
            FormatError::InvalidFeature(format!("no triangles section for scale {i}"))
        })?;
        let mut triangles = Vec::new();
        load_outer_triangles(
            &mut section.source_at(offset)?,
            &self.info.coding_params(i),
            &mut triangles,
        )?;
        Ok(triangles)
    }

    pub fn parse_metadata(&mut self) {
        if self.parsed.contains(Stage::Metadata) {
            return;
        }
        self.parsed.insert(Stage::Metadata);
        let Some(meta) = self.info.meta_deserializer() else {
            return;
        };
        self.reads += 1;
        match meta.get(self.id.0) {
            Ok(m) => self.metadata = m,
            Err(e) => error!(feature = %self.id, error = %e, "cannot read metadata"),
        }
    }

    pub fn parse_meta_ids(&mut self) {
        if self.parsed.contains(Stage::MetaIds) {
            return;
        }
        self.parsed.insert(Stage::MetaIds);
        let Some(meta) = self.info.meta_deserializer() else {
            return;
        };
        self.reads += 1;
        match meta.get_ids(self.id.0) {
            Ok(ids) => self.meta_ids = ids,
            Err(e) => error!(feature = %self.id, error = %e, "cannot read metadata ids"),
        }
    }

    #[inline]
    pub fn id(&self) -> FeatureId {
        self.id
    }

    #[inline]
    pub fn header(&self) -> u8 {
        self.header
    }

    /// Buffer and section reads performed so far.
    #[inline]
    pub fn reads(&self) -> u32 {
        self.reads
    }

    /// Some stage hit malformed bytes.
    #[inline]
    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    #[inline]
    pub fn geom_type(&self) -> GeomType {
        HeaderGeomType::from_header(self.header).into()
    }

    pub fn types(&mut self) -> &[PackedType] {
        self.parse_types();
        &self.types
    }

    pub fn types_holder(&mut self) -> TypesHolder {
        self.parse_types();
        TypesHolder::new(self.geom_type(), self.types.iter().copied())
    }

    /// Centre of a point feature.
    pub fn center(&mut self) -> PointD {
        debug_assert_eq!(self.geom_type(), GeomType::Point, "center of a non-point feature");
        self.parse_common();
        self.center
    }

    pub fn layer(&mut self) -> i8 {
        self.parse_common();
        self.params.layer
    }

    pub fn names(&mut self) -> &MultilangNames {
        self.parse_common();
        &self.params.names
    }

    pub fn name(&mut self, lang: i8) -> Option<&str> {
        self.parse_common();
        self.params.names.get(lang)
    }

    /// Name for display: `device_lang`, then default, international and
    /// English.
    pub fn readable_name(&mut self, device_lang: i8) -> Option<&str> {
        self.parse_common();
        self.params.names.readable_name(device_lang)
    }

    pub fn house_number(&mut self) -> &str {
        self.parse_common();
        &self.params.house
    }

    pub fn rank(&mut self) -> u8 {
        self.parse_common();
        self.params.rank
    }

    /// Population from the rank; 0 for unranked features.
    pub fn population(&mut self) -> u64 {
        match self.rank() {
            0 => 0,
            r => rank_to_population(r),
        }
    }

    pub fn road_ref(&mut self) -> &str {
        self.parse_common();
        &self.params.road_ref
    }

    pub fn points(&mut self, scale: impl Into<ScaleRequest>) -> &[PointD] {
        self.parse_geometry(scale);
        &self.points
    }

    pub fn triangles_as_points(&mut self, scale: impl Into<ScaleRequest>) -> &[PointD] {
        self.parse_triangles(scale);
        &self.triangles
    }

    /// Points of the pinned line geometry (`Best` when nothing is pinned
    /// yet). Points and areas keep no path, so they count 0.
    pub fn points_count(&mut self) -> usize {
        match self.geom_type() {
            GeomType::Line => self.points(ScaleRequest::Best).len(),
            GeomType::Point | GeomType::Area => 0,
        }
    }

    pub fn limit_rect(&mut self, scale: impl Into<ScaleRequest>) -> RectD {
        match self.geom_type() {
            GeomType::Point => self.parse_common(),
            GeomType::Line => self.parse_geometry(scale),
            GeomType::Area => self.parse_triangles(scale),
        }
        self.limit_rect
    }

    pub fn is_empty_geometry(&mut self, scale: impl Into<ScaleRequest>) -> bool {
        match self.geom_type() {
            GeomType::Point => false,
            GeomType::Line => self.points(scale).is_empty(),
            GeomType::Area => self.triangles_as_points(scale).is_empty(),
        }
    }

    pub fn metadata(&mut self) -> &Metadata {
        self.parse_metadata();
        &self.metadata
    }

    /// Resolves only the string of `kind`, caching it.
    pub fn metadata_value(&mut self, kind: MetaKind) -> Option<&str> {
        self.load_meta_value(kind);
        self.metadata.get(kind)
    }

    pub fn has_metadata(&mut self, kind: MetaKind) -> bool {
        self.load_meta_value(kind);
        self.metadata.has(kind)
    }

    fn load_meta_value(&mut self, kind: MetaKind) {
        let bit = 1u32 << kind as u8;
        if self.parsed.contains(Stage::Metadata)
            || self.metadata.has(kind)
            || self.meta_failed & bit != 0
        {
            return;
        }
        self.parse_meta_ids();
        let Some(&(_, id)) = self.meta_ids.iter().find(|(k, _)| *k == kind as u8) else {
            return;
        };
        let Some(meta) = self.info.meta_deserializer() else {
            return;
        };
        self.reads += 1;
        match meta.get_meta_by_id(id) {
            Ok(value) => self.metadata.set(kind, value),
            Err(e) => {
                self.meta_failed |= bit;
                error!(feature = %self.id, kind = %kind, id, error = %e, "cannot read metadata value");
            }
        }
    }

    /// `(kind, string id)` pairs without resolving the strings.
    pub fn meta_ids(&mut self) -> &[(u8, u32)] {
        self.parse_meta_ids();
        &self.meta_ids
    }

    pub fn outer_geometry_stats(&mut self) -> GeomStat {
        self.parse_header2();
        let offsets = match &self.header2 {
            Header2::OuterLine { offsets, .. } => offsets.clone(),
            _ => GeometryOffsets::default(),
        };
        self.outer_stats(&offsets, false)
    }

    pub fn outer_triangles_stats(&mut self) -> GeomStat {
        self.parse_header2();
        let offsets = match &self.header2 {
            Header2::OuterArea { offsets } => offsets.clone(),
            _ => GeometryOffsets::default(),
        };
        self.outer_stats(&offsets, true)
    }

    fn outer_stats(&mut self, offsets: &GeometryOffsets, triangles: bool) -> GeomStat {
        let count = self.info.scale_count();
        let mut stat = GeomStat {
            sizes: vec![0; count],
            elements: vec![0; count],
        };
        for i in 0..count {
            let GeomOffset::Real(offset) = offsets.get(i) else {
                continue;
            };
            match self.scan_outer(i, offset, triangles) {
                Ok((size, n)) => {
                    stat.sizes[i] = size;
                    stat.elements[i] = n;
                }
                Err(e) => {
                    warn!(feature = %self.id, scale = i, error = %e, "outer geometry unreadable")
                }
            }
        }
        stat
    }

    /// Encoded size and element count (points or triangles) of one bucket,
    /// measured by skipping over its deltas.
    fn scan_outer(&mut self, i: usize, offset: u32, triangles: bool) -> Result<(u32, u32)> {
        self.reads += 1;
        let section = if triangles {
            self.info.triangles_reader(i)
        } else {
            self.info.geometry_reader(i)
        };
        let Some(section) = section else {
            return Ok((0, 0));
        };
        let mut src = section.source_at(offset)?;
        let n = src.read_var_u32()?;
        let deltas = if triangles { n as usize * 3 } else { n as usize };
        for _ in 0..deltas {
            src.read_var_u64()?;
        }
        Ok(((src.pos() - offset as usize) as u32, n))
    }

    /// One-line summary for logs and the CLI.
    pub fn debug_string(&mut self) -> String {
        self.parse_common();
        let mut s = format!("{} {}", self.id, self.geom_type());
        let types: Vec<String> = self
            .types
            .iter()
            .map(|&t| self.registry.readable_name(t))
            .collect();
        let _ = write!(s, " types=[{}]", types.join(","));
        if let Some(name) = self.params.names.readable_name(super::names::DEFAULT_CODE) {
            let _ = write!(s, " name={name:?}");
        }
        if self.params.layer != 0 {
            let _ = write!(s, " layer={}", self.params.layer);
        }
        if self.params.rank != 0 {
            let _ = write!(s, " rank={}", self.params.rank);
        }
        if !self.params.road_ref.is_empty() {
            let _ = write!(s, " ref={:?}", self.params.road_ref);
        }
        if !self.params.house.is_empty() {
            let _ = write!(s, " house={:?}", self.params.house);
        }
        if self.geom_type() == GeomType::Point {
            let _ = write!(s, " center={}", self.center);
        } else {
            self.parse_header2();
            let _ = match &self.header2 {
                Header2::Point => Ok(()),
                Header2::InnerLine { points, .. } => write!(s, " points={}", points.len()),
                Header2::InnerArea { triangles } => write!(s, " triangles={}", triangles.len() / 3),
                Header2::OuterLine { offsets, .. } | Header2::OuterArea { offsets } => {
                    let buckets: String = offsets
                        .iter()
                        .map(|o| match o {
                            GeomOffset::Real(_) => 'R',
                            GeomOffset::Fallback => 'F',
                            GeomOffset::Absent => '-',
                        })
                        .collect();
                    write!(s, " outer={buckets}")
                }
            };
        }
        if self.corrupt {
            s.push_str(" (corrupt)");
        }
        s
    }
}

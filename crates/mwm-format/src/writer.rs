//! Generator side: serializes [`FeatureBuilder`]s into a container.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mwm_coding::bits::BitWriter;
use mwm_coding::point_coding::MAX_COORD_BITS;
use mwm_coding::serial::{
    save_inner_path, save_inner_triangles, save_outer_path, save_outer_triangles, save_point,
};
use mwm_coding::varint::write_var_u32;
use mwm_coding::{CodingParams, DatSectionHeader, DatVersion, FilesContainerWriter, PointD, PointU};
use tracing::debug;

use crate::classifier::ClassifierRegistry;
use crate::error::{FormatError, Result};
use crate::feature::builder::{AreaGeometry, FeatureBuilder, FeatureGeometry, LineGeometry, ScaleGeometry};
use crate::feature::geometry::{
    mask_bytes_count, pack_simplification_mask, GeomOffset, GeometryOffsets, MAX_INNER_POINTS,
    MAX_INNER_STRIP_POINTS, MAX_SCALES_COUNT,
};
use crate::feature::{calculate_header, FeatureId, HeaderGeomType, MAX_TYPES_COUNT};
use crate::load_info::{
    geometry_tag, triangles_tag, write_offset_table, FEATURES_TAG, HEADER_TAG, OFFSETS_TAG,
};
use crate::metadata::{MetadataWriter, META_STRINGS_TAG, META_TAG};

fn invalid(message: impl Into<String>) -> FormatError {
    FormatError::InvalidFeature(message.into())
}

/// Accumulates features and writes them out as one container.
pub struct ArchiveWriter<'r> {
    registry: &'r ClassifierRegistry,
    scales: Vec<i32>,
    def_cp: CodingParams,
    scale_cps: Vec<CodingParams>,

    records: Vec<u8>,
    boundaries: Vec<u32>,
    geometry: Vec<Vec<u8>>,
    triangles: Vec<Vec<u8>>,
    meta: MetadataWriter,
    has_meta: bool,
}

impl<'r> ArchiveWriter<'r> {
    /// `scales` are the bucket thresholds (1..=4, strictly increasing,
    /// 0..=255); every bucket uses `coord_bits` until
    /// [`ArchiveWriter::with_scale_bits`] says otherwise.
    pub fn new(
        registry: &'r ClassifierRegistry,
        scales: Vec<i32>,
        coord_bits: u8,
        base: PointD,
    ) -> Result<Self> {
        if scales.is_empty() || scales.len() > MAX_SCALES_COUNT {
            return Err(invalid(format!("{} scale buckets", scales.len())));
        }
        if scales.iter().any(|s| !(0..=255).contains(s)) || scales.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(invalid(format!("bad scale thresholds {scales:?}")));
        }
        if !(1..=MAX_COORD_BITS).contains(&coord_bits) {
            return Err(invalid(format!("coord bits {coord_bits}")));
        }

        let def_cp = CodingParams::new(coord_bits, PointU::default()).with_base_point(base);
        let count = scales.len();
        let mut w = Self {
            registry,
            scales,
            def_cp,
            scale_cps: Vec::new(),
            records: Vec::new(),
            boundaries: vec![0],
            geometry: vec![Vec::new(); count],
            triangles: vec![Vec::new(); count],
            meta: MetadataWriter::default(),
            has_meta: false,
        };
        w.scale_cps = w.derive_scale_params(&vec![coord_bits; count]);
        Ok(w)
    }

    /// Per-bucket coord bits, coarser buckets usually fewer.
    pub fn with_scale_bits(mut self, bits: &[u8]) -> Result<Self> {
        if bits.len() != self.scales.len() {
            return Err(invalid(format!(
                "{} coord bit entries for {} scales",
                bits.len(),
                self.scales.len()
            )));
        }
        if let Some(b) = bits.iter().find(|b| !(1..=MAX_COORD_BITS).contains(*b)) {
            return Err(invalid(format!("coord bits {b}")));
        }
        if !self.records.is_empty() {
            return Err(invalid("coord bits changed after features were added"));
        }
        self.scale_cps = self.derive_scale_params(bits);
        Ok(self)
    }

    fn derive_scale_params(&self, bits: &[u8]) -> Vec<CodingParams> {
        let base = self.def_cp.to_d(self.def_cp.base_point());
        bits.iter()
            .map(|&b| CodingParams::new(b, PointU::default()).with_base_point(base))
            .collect()
    }

    /// Features added so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_feature(&mut self, fb: &FeatureBuilder) -> Result<FeatureId> {
        if fb.types.is_empty() || fb.types.len() > MAX_TYPES_COUNT {
            return Err(invalid(format!("{} types", fb.types.len())));
        }
        let indices = fb
            .types
            .iter()
            .map(|&t| {
                self.registry
                    .index_for_type(t)
                    .ok_or_else(|| invalid(format!("type {t} has no index")))
            })
            .collect::<Result<Vec<_>>>()?;

        let geom = match &fb.geometry {
            FeatureGeometry::Point(_) if !fb.params.house.is_empty() => HeaderGeomType::PointEx,
            FeatureGeometry::Point(_) => HeaderGeomType::Point,
            FeatureGeometry::Line(_) => HeaderGeomType::Line,
            FeatureGeometry::Area(_) => HeaderGeomType::Area,
        };
        let header = calculate_header(indices.len(), geom, &fb.params);

        let mut record = vec![header];
        for index in indices {
            write_var_u32(&mut record, index);
        }
        fb.params.write(header, &mut record);

        match &fb.geometry {
            FeatureGeometry::Point(p) => save_point(*p, &self.def_cp, &mut record),
            FeatureGeometry::Line(LineGeometry::Inner { points, masks }) => {
                self.write_inner_line(points, masks, &mut record)?
            }
            FeatureGeometry::Line(LineGeometry::Outer { first, buckets }) => {
                self.write_outer_line(*first, buckets, &mut record)?
            }
            FeatureGeometry::Area(AreaGeometry::InnerStrip(strip)) => {
                if !(3..=MAX_INNER_STRIP_POINTS).contains(&strip.len()) {
                    return Err(invalid(format!("inline strip of {} points", strip.len())));
                }
                BitWriter::new(&mut record).write_bits((strip.len() - 2) as u8, 4);
                save_inner_triangles(strip, &self.def_cp, &mut record);
            }
            FeatureGeometry::Area(AreaGeometry::Outer(buckets)) => {
                self.write_outer_area(buckets, &mut record)?
            }
        }

        let id = FeatureId(self.len() as u32);
        self.meta.add_feature(&fb.metadata)?;
        self.has_meta |= !fb.metadata.is_empty();
        self.records.extend_from_slice(&record);
        self.boundaries.push(self.records.len() as u32);
        Ok(id)
    }

    fn write_inner_line(&self, points: &[PointD], masks: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let n = points.len();
        if !(2..=MAX_INNER_POINTS).contains(&n) {
            return Err(invalid(format!("inline line of {n} points")));
        }
        if masks.len() != n - 2 {
            return Err(invalid(format!("{} masks for {n} points", masks.len())));
        }
        if let Some(m) = masks.iter().find(|&&m| m as usize >= self.scales.len()) {
            return Err(invalid(format!("mask {m} beyond {} scales", self.scales.len())));
        }
        BitWriter::new(out).write_bits(n as u8, 4);
        let mask = pack_simplification_mask(masks);
        out.extend_from_slice(&mask.to_le_bytes()[..mask_bytes_count(n)]);
        save_inner_path(points, &self.def_cp, out);
        Ok(())
    }

    fn write_outer_line(
        &mut self,
        first: PointD,
        buckets: &[ScaleGeometry],
        out: &mut Vec<u8>,
    ) -> Result<()> {
        // Readers predict from the stored (quantized) first point.
        let first_q = self.def_cp.to_d(self.def_cp.to_u(first));
        let offsets = self.write_buckets(buckets, false, |cp, pts, buf| {
            save_outer_path(pts, &cp.with_base_point(first_q), buf)
        })?;
        let mut tail = Vec::new();
        let mask = offsets.write(&mut tail);
        let mut bits = BitWriter::new(out);
        bits.write_bits(0, 4);
        bits.write_bits(mask, 4);
        save_point(first, &self.def_cp, out);
        out.extend_from_slice(&tail);
        Ok(())
    }

    fn write_outer_area(&mut self, buckets: &[ScaleGeometry], out: &mut Vec<u8>) -> Result<()> {
        if let Some(ScaleGeometry::Geometry(t)) = buckets
            .iter()
            .find(|b| matches!(b, ScaleGeometry::Geometry(t) if t.len() % 3 != 0))
        {
            return Err(invalid(format!("{} points do not form triangles", t.len())));
        }
        let offsets = self.write_buckets(buckets, true, |cp, pts, buf| {
            save_outer_triangles(pts, &cp, buf)
        })?;
        let mut tail = Vec::new();
        let mask = offsets.write(&mut tail);
        let mut bits = BitWriter::new(out);
        bits.write_bits(0, 4);
        bits.write_bits(mask, 4);
        out.extend_from_slice(&tail);
        Ok(())
    }

    fn write_buckets(
        &mut self,
        buckets: &[ScaleGeometry],
        triangles: bool,
        save: impl Fn(CodingParams, &[PointD], &mut Vec<u8>),
    ) -> Result<GeometryOffsets> {
        if buckets.len() > self.scales.len() {
            return Err(invalid(format!(
                "{} buckets for {} scales",
                buckets.len(),
                self.scales.len()
            )));
        }
        let mut offsets = vec![GeomOffset::Absent; self.scales.len()];
        for (i, bucket) in buckets.iter().enumerate() {
            offsets[i] = match bucket {
                ScaleGeometry::Absent => GeomOffset::Absent,
                ScaleGeometry::Fallback => GeomOffset::Fallback,
                ScaleGeometry::Geometry(pts) => {
                    let section = if triangles {
                        &mut self.triangles[i]
                    } else {
                        &mut self.geometry[i]
                    };
                    let offset = section.len() as u32;
                    save(self.scale_cps[i], pts, section);
                    GeomOffset::Real(offset)
                }
            };
        }
        Ok(GeometryOffsets::new(offsets))
    }

    fn header_section(&self) -> Vec<u8> {
        let base = self.def_cp.base_point();
        let mut h = vec![DatVersion::LATEST as u8, self.def_cp.coord_bits()];
        write_var_u32(&mut h, base.x);
        write_var_u32(&mut h, base.y);
        h.push(self.scales.len() as u8);
        h.extend(self.scales.iter().map(|&s| s as u8));
        h.extend(self.scale_cps.iter().map(|cp| cp.coord_bits()));
        h
    }

    pub fn finish<W: Write>(self, w: W) -> Result<W> {
        let mut out = FilesContainerWriter::new(w);
        out.write_section(HEADER_TAG, &self.header_section())?;

        let mut dat = Vec::with_capacity(DatSectionHeader::SERIALIZED_SIZE + self.records.len());
        DatSectionHeader {
            version: DatVersion::LATEST,
            features_offset: DatSectionHeader::SERIALIZED_SIZE as u32,
            features_size: self.records.len() as u32,
        }
        .write(&mut dat)?;
        dat.extend_from_slice(&self.records);
        out.write_section(FEATURES_TAG, &dat)?;

        let mut offs = Vec::with_capacity(4 * self.boundaries.len() + 4);
        write_offset_table(&mut offs, &self.boundaries);
        out.write_section(OFFSETS_TAG, &offs)?;

        for (i, g) in self.geometry.iter().enumerate() {
            if !g.is_empty() {
                out.write_section(&geometry_tag(i), g)?;
            }
        }
        for (i, t) in self.triangles.iter().enumerate() {
            if !t.is_empty() {
                out.write_section(&triangles_tag(i), t)?;
            }
        }
        if self.has_meta {
            let (meta, strings) = self.meta.finish();
            out.write_section(META_TAG, &meta)?;
            out.write_section(META_STRINGS_TAG, &strings)?;
        }

        debug!(
            features = self.boundaries.len() - 1,
            bytes = self.records.len(),
            "container written"
        );
        Ok(out.finish()?)
    }

    pub fn finish_to_bytes(self) -> Result<Vec<u8>> {
        self.finish(Vec::new())
    }

    pub fn finish_to_file(self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.finish(BufWriter::with_capacity(8 << 20, file))?;
        Ok(())
    }
}

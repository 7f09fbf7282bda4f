//! Choosing the geometry bucket for a display scale.
//!
//! Short lines and small areas are stored once, inline in the record; lines
//! keep a 2-bit "coarsest visible scale index" per interior point. Larger
//! geometry is stored per scale bucket in separate sections and the record
//! holds one offset per bucket.

use mwm_coding::source::ArraySource;
use mwm_coding::varint::write_var_u32;
use mwm_coding::{CodingError, PointD};

/// Offset value marking "no geometry of its own, use the next finer bucket".
pub const GEOM_OFFSET_FALLBACK: u32 = u32::MAX - 1;

/// Most scale buckets a container can declare (one presence bit each).
pub const MAX_SCALES_COUNT: usize = 4;

/// Most points of an inline line (4-bit count).
pub const MAX_INNER_POINTS: usize = 15;

/// Most points of an inline triangle strip (4-bit triangle count + 2).
pub const MAX_INNER_STRIP_POINTS: usize = 17;

/// Mask bytes stored for an inline line of `points` points.
#[inline]
pub fn mask_bytes_count(points: usize) -> usize {
    (points.saturating_sub(2) + 3) / 4
}

/// Requested geometry resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleRequest {
    /// Most detailed geometry present.
    Best,
    /// Coarsest geometry present.
    Worst,
    /// Geometry for a display scale (zoom level).
    Scale(i32),
}

impl From<i32> for ScaleRequest {
    fn from(scale: i32) -> Self {
        ScaleRequest::Scale(scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomOffset {
    Real(u32),
    Fallback,
    Absent,
}

impl GeomOffset {
    #[inline]
    pub fn is_real(self) -> bool {
        matches!(self, GeomOffset::Real(_))
    }
}

/// Per-bucket offsets of a feature's outer geometry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometryOffsets(Vec<GeomOffset>);

impl GeometryOffsets {
    pub fn new(offsets: Vec<GeomOffset>) -> Self {
        Self(offsets)
    }

    /// One varint per bit set in `mask`; buckets without a bit are absent.
    pub fn read(src: &mut ArraySource<'_>, mask: u8, count: usize) -> mwm_coding::Result<Self> {
        if count < MAX_SCALES_COUNT && mask >> count != 0 {
            return Err(CodingError::InvalidData(format!(
                "offsets mask {mask:#06b} for {count} scales"
            )));
        }
        let mut offsets = vec![GeomOffset::Absent; count];
        for (i, slot) in offsets.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *slot = match src.read_var_u32()? {
                    GEOM_OFFSET_FALLBACK => GeomOffset::Fallback,
                    v => GeomOffset::Real(v),
                };
            }
        }
        Ok(Self(offsets))
    }

    /// Presence mask and varints, the inverse of [`GeometryOffsets::read`].
    pub fn write(&self, out: &mut Vec<u8>) -> u8 {
        let mut mask = 0u8;
        for (i, off) in self.0.iter().enumerate() {
            match *off {
                GeomOffset::Real(v) => {
                    debug_assert!(v != GEOM_OFFSET_FALLBACK);
                    mask |= 1 << i;
                    write_var_u32(out, v);
                }
                GeomOffset::Fallback => {
                    mask |= 1 << i;
                    write_var_u32(out, GEOM_OFFSET_FALLBACK);
                }
                GeomOffset::Absent => {}
            }
        }
        mask
    }

    #[inline]
    pub fn get(&self, i: usize) -> GeomOffset {
        self.0.get(i).copied().unwrap_or(GeomOffset::Absent)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = GeomOffset> + '_ {
        self.0.iter().copied()
    }
}

/// Bucket index for inline geometry. Scales past the last threshold are
/// clamped to it.
pub fn inner_scale_index(scales: &[i32], req: ScaleRequest) -> usize {
    let count = scales.len();
    debug_assert!(count > 0);
    match req {
        ScaleRequest::Worst => 0,
        ScaleRequest::Best => count.saturating_sub(1),
        ScaleRequest::Scale(scale) => {
            let last = scales.last().copied().unwrap_or(scale);
            let scale = scale.min(last);
            scales
                .iter()
                .position(|&s| scale <= s)
                .unwrap_or(count.saturating_sub(1))
        }
    }
}

/// Bucket index for outer geometry, `None` when the feature has no
/// geometry usable at that scale.
///
/// A scale request starts at the first bucket whose threshold is not below
/// the (clamped) scale and moves to finer buckets past fallbacks.
pub fn outer_scale_index(
    scales: &[i32],
    req: ScaleRequest,
    offsets: &GeometryOffsets,
) -> Option<usize> {
    let count = scales.len();
    match req {
        ScaleRequest::Best => (0..count).rev().find(|&i| offsets.get(i).is_real()),
        ScaleRequest::Worst => (0..count).find(|&i| offsets.get(i).is_real()),
        ScaleRequest::Scale(scale) => {
            let last = scales.last().copied()?;
            let scale = scale.min(last);
            let mut ind = 0;
            while ind < count && (scale > scales[ind] || offsets.get(ind) == GeomOffset::Fallback)
            {
                ind += 1;
            }
            (ind < count && offsets.get(ind).is_real()).then_some(ind)
        }
    }
}

/// Coarsest scale index at which interior point `i` (0-based, first point
/// excluded) is still drawn.
#[inline]
pub fn point_min_scale_index(mask: u32, i: usize) -> u8 {
    ((mask >> (2 * i)) & 0x3) as u8
}

/// Keeps the end points and every interior point visible at `scale_index`.
pub fn filter_inner_points(points: &[PointD], mask: u32, scale_index: usize) -> Vec<PointD> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(n);
    out.push(points[0]);
    for (i, p) in points[1..n - 1].iter().enumerate() {
        if point_min_scale_index(mask, i) as usize <= scale_index {
            out.push(*p);
        }
    }
    out.push(points[n - 1]);
    out
}

/// Packs per-interior-point scale indices, 2 bits each.
pub fn pack_simplification_mask(indices: &[u8]) -> u32 {
    indices
        .iter()
        .enumerate()
        .fold(0u32, |m, (i, &v)| m | (((v & 0x3) as u32) << (2 * i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCALES: [i32; 3] = [5, 10, 17];

    fn offsets(v: &[GeomOffset]) -> GeometryOffsets {
        GeometryOffsets::new(v.to_vec())
    }

    #[test]
    fn scale_advances_past_fallback() {
        let o = offsets(&[GeomOffset::Real(0), GeomOffset::Fallback, GeomOffset::Real(40)]);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(8), &o), Some(2));
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Best, &o), Some(2));
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Worst, &o), Some(0));
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(3), &o), Some(0));
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(5), &o), Some(0));
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(12), &o), Some(2));
    }

    #[test]
    fn scale_past_last_is_clamped() {
        let o = offsets(&[GeomOffset::Absent, GeomOffset::Real(3), GeomOffset::Real(9)]);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(25), &o), Some(2));
        assert_eq!(inner_scale_index(&SCALES, ScaleRequest::Scale(25)), 2);
    }

    #[test]
    fn absent_bucket_means_no_geometry() {
        let o = offsets(&[GeomOffset::Absent, GeomOffset::Real(3), GeomOffset::Real(9)]);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(4), &o), None);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Worst, &o), Some(1));

        let none = offsets(&[GeomOffset::Absent; 3]);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Best, &none), None);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Worst, &none), None);
        assert_eq!(outer_scale_index(&SCALES, ScaleRequest::Scale(17), &none), None);

        let trailing_fallback = offsets(&[GeomOffset::Absent, GeomOffset::Absent, GeomOffset::Fallback]);
        assert_eq!(
            outer_scale_index(&SCALES, ScaleRequest::Scale(17), &trailing_fallback),
            None
        );
    }

    #[test]
    fn inner_index_sentinels() {
        assert_eq!(inner_scale_index(&SCALES, ScaleRequest::Worst), 0);
        assert_eq!(inner_scale_index(&SCALES, ScaleRequest::Best), 2);
        assert_eq!(inner_scale_index(&SCALES, ScaleRequest::Scale(10)), 1);
        assert_eq!(inner_scale_index(&SCALES, ScaleRequest::Scale(0)), 0);
    }

    #[test]
    fn offsets_read_back_from_mask() {
        let o = offsets(&[GeomOffset::Real(7), GeomOffset::Absent, GeomOffset::Fallback]);
        let mut buf = Vec::new();
        let mask = o.write(&mut buf);
        assert_eq!(mask, 0b101);
        let back = GeometryOffsets::read(&mut ArraySource::new(&buf), mask, 3).unwrap();
        assert_eq!(back, o);
    }

    #[test]
    fn mask_bits_beyond_scale_count_are_rejected() {
        let buf = [1u8, 2, 3, 4];
        assert!(GeometryOffsets::read(&mut ArraySource::new(&buf), 0b1000, 3).is_err());
    }

    #[test]
    fn mask_filters_interior_points() {
        let pts: Vec<PointD> = (0..5).map(|i| PointD::new(i as f64, 0.0)).collect();
        let mask = pack_simplification_mask(&[0, 2, 1]);
        let at1 = filter_inner_points(&pts, mask, 1);
        assert_eq!(at1.len(), 4);
        assert_eq!(at1[2], pts[3]);
        assert_eq!(filter_inner_points(&pts, mask, 0).len(), 3);
        assert_eq!(filter_inner_points(&pts, mask, 2).len(), 5);
    }

    proptest! {
        #[test]
        fn coarser_scales_never_add_points(masks in prop::collection::vec(0u8..4, 0..12)) {
            let n = masks.len() + 2;
            let pts: Vec<PointD> = (0..n).map(|i| PointD::new(i as f64, i as f64)).collect();
            let mask = pack_simplification_mask(&masks);
            let mut prev = 0;
            for s in 0..MAX_SCALES_COUNT {
                let out = filter_inner_points(&pts, mask, s);
                prop_assert!(out.len() >= prev);
                prop_assert_eq!(out[0], pts[0]);
                prop_assert_eq!(*out.last().unwrap(), pts[n - 1]);
                prev = out.len();
            }
        }
    }
}

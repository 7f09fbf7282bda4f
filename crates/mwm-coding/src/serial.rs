//! Delta-coded point sequences.
//!
//! Every point is stored as the varint of its delta against the previous
//! point; the first one is predicted from the coding params' base point.
//! Inner sequences have an externally known length, outer sequences carry a
//! varint count.

use crate::error::{CodingError, Result};
use crate::geometry::PointD;
use crate::point_coding::{decode_delta, encode_delta, CodingParams};
use crate::source::ArraySource;
use crate::varint::{write_var_u32, write_var_u64};

/// Cap on decoded element counts, so a corrupt count cannot trigger a huge
/// allocation before the reads fail.
const MAX_ELEMENTS: u32 = 1 << 24;

fn save_chain(points: &[PointD], cp: &CodingParams, out: &mut Vec<u8>) {
    let mut prev = cp.base_point();
    for p in points {
        let cur = cp.to_u(*p);
        write_var_u64(out, encode_delta(cur, prev));
        prev = cur;
    }
}

fn load_chain(
    src: &mut ArraySource<'_>,
    count: usize,
    cp: &CodingParams,
    out: &mut Vec<PointD>,
) -> Result<()> {
    out.reserve(count);
    let mut prev = cp.base_point();
    for _ in 0..count {
        let cur = decode_delta(src.read_var_u64()?, prev);
        out.push(cp.to_d(cur));
        prev = cur;
    }
    Ok(())
}

fn read_count(src: &mut ArraySource<'_>) -> Result<usize> {
    let n = src.read_var_u32()?;
    if n > MAX_ELEMENTS {
        return Err(CodingError::InvalidData(format!("element count {n}")));
    }
    Ok(n as usize)
}

/// Single point, delta against the base point.
pub fn save_point(p: PointD, cp: &CodingParams, out: &mut Vec<u8>) {
    write_var_u64(out, encode_delta(cp.to_u(p), cp.base_point()));
}

pub fn load_point(src: &mut ArraySource<'_>, cp: &CodingParams) -> Result<PointD> {
    let delta = src.read_var_u64()?;
    Ok(cp.to_d(decode_delta(delta, cp.base_point())))
}

pub fn save_inner_path(points: &[PointD], cp: &CodingParams, out: &mut Vec<u8>) {
    save_chain(points, cp, out)
}

/// Appends `count` points to `out`.
pub fn load_inner_path(
    src: &mut ArraySource<'_>,
    count: usize,
    cp: &CodingParams,
    out: &mut Vec<PointD>,
) -> Result<()> {
    load_chain(src, count, cp, out)
}

/// `cp`'s base point must be the point preceding `points` (the feature's
/// first point, which is stored in the record itself).
pub fn save_outer_path(points: &[PointD], cp: &CodingParams, out: &mut Vec<u8>) {
    write_var_u32(out, points.len() as u32);
    save_chain(points, cp, out)
}

pub fn load_outer_path(
    src: &mut ArraySource<'_>,
    cp: &CodingParams,
    out: &mut Vec<PointD>,
) -> Result<()> {
    let count = read_count(src)?;
    load_chain(src, count, cp, out)
}

/// Triangle strip of `strip.len()` points.
pub fn save_inner_triangles(strip: &[PointD], cp: &CodingParams, out: &mut Vec<u8>) {
    save_chain(strip, cp, out)
}

/// Reads a strip of `count` points and appends it to `out` expanded into a
/// flat triangle list (3 points per triangle).
pub fn load_inner_triangles(
    src: &mut ArraySource<'_>,
    count: usize,
    cp: &CodingParams,
    out: &mut Vec<PointD>,
) -> Result<()> {
    let mut strip = Vec::with_capacity(count);
    load_chain(src, count, cp, &mut strip)?;
    out.reserve(count.saturating_sub(2) * 3);
    for i in 2..strip.len() {
        out.extend_from_slice(&[strip[i - 2], strip[i - 1], strip[i]]);
    }
    Ok(())
}

/// `triangles` is a flat list, 3 points per triangle.
pub fn save_outer_triangles(triangles: &[PointD], cp: &CodingParams, out: &mut Vec<u8>) {
    debug_assert!(triangles.len() % 3 == 0);
    write_var_u32(out, (triangles.len() / 3) as u32);
    save_chain(triangles, cp, out)
}

pub fn load_outer_triangles(
    src: &mut ArraySource<'_>,
    cp: &CodingParams,
    out: &mut Vec<PointD>,
) -> Result<()> {
    let count = read_count(src)?;
    load_chain(src, count * 3, cp, out)
}

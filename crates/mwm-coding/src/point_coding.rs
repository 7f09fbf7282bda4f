use crate::geometry::{PointD, PointU};
use crate::varint::{zigzag_decode, zigzag_encode};

/// Mercator extent covered by the quantization grid (both axes).
pub const MERCATOR_MIN: f64 = -180.0;
pub const MERCATOR_MAX: f64 = 180.0;

/// Widest grid a delta can be interleaved for without overflowing 64 bits.
pub const MAX_COORD_BITS: u8 = 30;

#[inline]
fn coord_size(coord_bits: u8) -> f64 {
    ((1u64 << coord_bits) - 1) as f64
}

pub fn point_d_to_u(p: PointD, coord_bits: u8) -> PointU {
    let size = coord_size(coord_bits);
    let q = |v: f64| {
        let v = v.clamp(MERCATOR_MIN, MERCATOR_MAX);
        ((v - MERCATOR_MIN) / (MERCATOR_MAX - MERCATOR_MIN) * size).round() as u32
    };
    PointU::new(q(p.x), q(p.y))
}

pub fn point_u_to_d(p: PointU, coord_bits: u8) -> PointD {
    let size = coord_size(coord_bits);
    let d = |v: u32| v as f64 * (MERCATOR_MAX - MERCATOR_MIN) / size + MERCATOR_MIN;
    PointD::new(d(p.x), d(p.y))
}

/// Spreads the low 32 bits of `v` over the even bits of a u64.
#[inline]
fn spread(v: u32) -> u64 {
    let mut x = v as u64;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

#[inline]
fn compact(v: u64) -> u32 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x as u32
}

/// Zigzags both axis deltas and interleaves them so small deltas in either
/// direction give small varints.
pub fn encode_delta(actual: PointU, prediction: PointU) -> u64 {
    let dx = zigzag_encode(actual.x as i64 - prediction.x as i64);
    let dy = zigzag_encode(actual.y as i64 - prediction.y as i64);
    debug_assert!(dx <= u32::MAX as u64 && dy <= u32::MAX as u64);
    spread(dx as u32) | (spread(dy as u32) << 1)
}

pub fn decode_delta(delta: u64, prediction: PointU) -> PointU {
    let dx = zigzag_decode(compact(delta) as u64);
    let dy = zigzag_decode(compact(delta >> 1) as u64);
    PointU::new(
        (prediction.x as i64 + dx) as u32,
        (prediction.y as i64 + dy) as u32,
    )
}

/// Grid resolution plus the point deltas are predicted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingParams {
    coord_bits: u8,
    base_point: PointU,
}

impl Default for CodingParams {
    fn default() -> Self {
        Self::new(MAX_COORD_BITS, PointU::default())
    }
}

impl CodingParams {
    #[inline]
    pub fn new(coord_bits: u8, base_point: PointU) -> Self {
        debug_assert!((1..=MAX_COORD_BITS).contains(&coord_bits));
        Self {
            coord_bits,
            base_point,
        }
    }

    #[inline]
    pub fn coord_bits(&self) -> u8 {
        self.coord_bits
    }

    #[inline]
    pub fn base_point(&self) -> PointU {
        self.base_point
    }

    /// Same grid, new prediction base.
    #[inline]
    pub fn with_base_point(mut self, p: PointD) -> Self {
        self.base_point = point_d_to_u(p, self.coord_bits);
        self
    }

    #[inline]
    pub fn to_u(&self, p: PointD) -> PointU {
        point_d_to_u(p, self.coord_bits)
    }

    #[inline]
    pub fn to_d(&self, p: PointU) -> PointD {
        point_u_to_d(p, self.coord_bits)
    }
}

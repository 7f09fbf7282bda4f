//! Feature records: header byte, common params, geometry and the decoder.

pub mod builder;
pub mod decoder;
pub mod geometry;
pub mod names;
pub mod params;

use std::fmt;

use crate::type_path::PackedType;

/// Most types a single feature can carry.
pub const MAX_TYPES_COUNT: usize = 8;

pub const HEADER_MASK_TYPE: u8 = 0b0000_0111;
pub const HEADER_MASK_HAS_NAME: u8 = 1 << 3;
pub const HEADER_MASK_HAS_LAYER: u8 = 1 << 4;
pub const HEADER_MASK_GEOMTYPE: u8 = 0b0110_0000;
pub const HEADER_MASK_HAS_ADDINFO: u8 = 1 << 7;

/// Geometry kind bits of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderGeomType {
    Point = 0,
    Line = 1 << 5,
    Area = 2 << 5,
    /// Point carrying a house number instead of a rank.
    PointEx = 3 << 5,
}

impl HeaderGeomType {
    #[inline]
    pub fn from_header(header: u8) -> Self {
        match header & HEADER_MASK_GEOMTYPE {
            x if x == HeaderGeomType::Line as u8 => HeaderGeomType::Line,
            x if x == HeaderGeomType::Area as u8 => HeaderGeomType::Area,
            x if x == HeaderGeomType::PointEx as u8 => HeaderGeomType::PointEx,
            _ => HeaderGeomType::Point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomType {
    Point,
    Line,
    Area,
}

impl From<HeaderGeomType> for GeomType {
    fn from(h: HeaderGeomType) -> Self {
        match h {
            HeaderGeomType::Line => GeomType::Line,
            HeaderGeomType::Area => GeomType::Area,
            HeaderGeomType::Point | HeaderGeomType::PointEx => GeomType::Point,
        }
    }
}

impl fmt::Display for GeomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GeomType::Point => "Point",
            GeomType::Line => "Line",
            GeomType::Area => "Area",
        })
    }
}

/// Position of a feature inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resolved types of a feature together with its geometry kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesHolder {
    geom_type: GeomType,
    types: Vec<PackedType>,
}

impl TypesHolder {
    pub fn new(geom_type: GeomType, types: impl IntoIterator<Item = PackedType>) -> Self {
        Self {
            geom_type,
            types: types.into_iter().collect(),
        }
    }

    #[inline]
    pub fn geom_type(&self) -> GeomType {
        self.geom_type
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    #[inline]
    pub fn has(&self, t: PackedType) -> bool {
        self.types.contains(&t)
    }

    /// Some type equals `prefix` or descends from it.
    pub fn has_with_prefix(&self, prefix: PackedType) -> bool {
        self.types.iter().any(|&t| prefix.is_prefix_of(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = PackedType> + '_ {
        self.types.iter().copied()
    }
}

/// Header byte for a feature with `types_count` types.
pub fn calculate_header(types_count: usize, geom: HeaderGeomType, params: &params::FeatureParams) -> u8 {
    debug_assert!((1..=MAX_TYPES_COUNT).contains(&types_count));
    let mut header = (types_count as u8 - 1) & HEADER_MASK_TYPE;
    header |= geom as u8;
    if !params.names.is_empty() {
        header |= HEADER_MASK_HAS_NAME;
    }
    if params.layer != params::LAYER_EMPTY {
        header |= HEADER_MASK_HAS_LAYER;
    }
    if params.has_add_info(geom) {
        header |= HEADER_MASK_HAS_ADDINFO;
    }
    header
}

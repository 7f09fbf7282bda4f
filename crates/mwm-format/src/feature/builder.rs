//! In-memory feature handed to the archive writer.

use mwm_coding::PointD;

use crate::metadata::{MetaKind, Metadata};
use crate::type_path::PackedType;

use super::names::MultilangNames;
use super::params::FeatureParams;
use super::GeomType;

/// Geometry of one scale bucket of outer geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleGeometry {
    /// Nothing stored; the feature is not drawn from this bucket.
    Absent,
    /// Nothing stored; readers use the next finer bucket.
    Fallback,
    Geometry(Vec<PointD>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineGeometry {
    /// Stored in the record. `masks[i]` is the coarsest scale index interior
    /// point `i + 1` is drawn at.
    Inner { points: Vec<PointD>, masks: Vec<u8> },
    /// Stored per bucket; bucket points exclude `first`.
    Outer {
        first: PointD,
        buckets: Vec<ScaleGeometry>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AreaGeometry {
    /// Triangle strip stored in the record.
    InnerStrip(Vec<PointD>),
    /// Flat triangle lists per bucket.
    Outer(Vec<ScaleGeometry>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(PointD),
    Line(LineGeometry),
    Area(AreaGeometry),
}

impl FeatureGeometry {
    pub fn geom_type(&self) -> GeomType {
        match self {
            FeatureGeometry::Point(_) => GeomType::Point,
            FeatureGeometry::Line(_) => GeomType::Line,
            FeatureGeometry::Area(_) => GeomType::Area,
        }
    }
}

/// Feature under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBuilder {
    pub types: Vec<PackedType>,
    pub params: FeatureParams,
    pub geometry: FeatureGeometry,
    pub metadata: Metadata,
}

impl FeatureBuilder {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Self {
            types: Vec::new(),
            params: FeatureParams::default(),
            geometry,
            metadata: Metadata::default(),
        }
    }

    pub fn point(p: PointD) -> Self {
        Self::new(FeatureGeometry::Point(p))
    }

    /// Line stored inline; every interior point is visible at all scales.
    pub fn inner_line(points: Vec<PointD>) -> Self {
        let masks = vec![0; points.len().saturating_sub(2)];
        Self::new(FeatureGeometry::Line(LineGeometry::Inner { points, masks }))
    }

    pub fn inner_line_with_masks(points: Vec<PointD>, masks: Vec<u8>) -> Self {
        Self::new(FeatureGeometry::Line(LineGeometry::Inner { points, masks }))
    }

    pub fn outer_line(first: PointD, buckets: Vec<ScaleGeometry>) -> Self {
        Self::new(FeatureGeometry::Line(LineGeometry::Outer { first, buckets }))
    }

    pub fn inner_area(strip: Vec<PointD>) -> Self {
        Self::new(FeatureGeometry::Area(AreaGeometry::InnerStrip(strip)))
    }

    pub fn outer_area(buckets: Vec<ScaleGeometry>) -> Self {
        Self::new(FeatureGeometry::Area(AreaGeometry::Outer(buckets)))
    }

    pub fn with_type(mut self, t: PackedType) -> Self {
        self.types.push(t);
        self
    }

    pub fn with_name(mut self, lang: i8, name: impl Into<String>) -> Self {
        self.params.names.add(lang, name);
        self
    }

    pub fn with_layer(mut self, layer: i8) -> Self {
        self.params.layer = layer;
        self
    }

    /// Points only.
    pub fn with_rank(mut self, rank: u8) -> Self {
        self.params.rank = rank;
        self
    }

    /// Lines only.
    pub fn with_road_ref(mut self, road_ref: impl Into<String>) -> Self {
        self.params.road_ref = road_ref.into();
        self
    }

    /// Areas and points. A point with a house number is stored as an
    /// extended point and loses its rank.
    pub fn with_house(mut self, house: impl Into<String>) -> Self {
        self.params.house = house.into();
        self
    }

    pub fn with_meta(mut self, kind: MetaKind, value: impl Into<String>) -> Self {
        self.metadata.set(kind, value);
        self
    }

    #[inline]
    pub fn names(&self) -> &MultilangNames {
        &self.params.names
    }

    #[inline]
    pub fn geom_type(&self) -> GeomType {
        self.geometry.geom_type()
    }
}

use mwm_coding::source::{write_string, ArraySource};

use super::names::MultilangNames;
use super::{HeaderGeomType, HEADER_MASK_HAS_ADDINFO, HEADER_MASK_HAS_LAYER, HEADER_MASK_HAS_NAME};

/// Layer of features that declare none.
pub const LAYER_EMPTY: i8 = 0;

/// Fields gated by the header byte, common to all geometry kinds.
///
/// Which of `rank` / `road_ref` / `house` is stored depends on the
/// geometry kind: points carry a rank, lines a road reference, areas and
/// extended points a house number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureParams {
    pub names: MultilangNames,
    pub layer: i8,
    pub rank: u8,
    pub road_ref: String,
    pub house: String,
}

impl FeatureParams {
    pub(crate) fn has_add_info(&self, geom: HeaderGeomType) -> bool {
        match geom {
            HeaderGeomType::Point => self.rank != 0,
            HeaderGeomType::Line => !self.road_ref.is_empty(),
            HeaderGeomType::Area | HeaderGeomType::PointEx => !self.house.is_empty(),
        }
    }

    pub fn read(src: &mut ArraySource<'_>, header: u8) -> mwm_coding::Result<Self> {
        let mut params = Self::default();
        if header & HEADER_MASK_HAS_NAME != 0 {
            params.names = MultilangNames::read(src)?;
        }
        if header & HEADER_MASK_HAS_LAYER != 0 {
            params.layer = src.read_i8()?;
        }
        if header & HEADER_MASK_HAS_ADDINFO != 0 {
            match HeaderGeomType::from_header(header) {
                HeaderGeomType::Point => params.rank = src.read_u8()?,
                HeaderGeomType::Line => params.road_ref = src.read_string()?.to_owned(),
                HeaderGeomType::Area | HeaderGeomType::PointEx => {
                    params.house = src.read_string()?.to_owned()
                }
            }
        }
        Ok(params)
    }

    /// Writes the fields `header` declares.
    pub fn write(&self, header: u8, out: &mut Vec<u8>) {
        if header & HEADER_MASK_HAS_NAME != 0 {
            self.names.write(out);
        }
        if header & HEADER_MASK_HAS_LAYER != 0 {
            out.push(self.layer as u8);
        }
        if header & HEADER_MASK_HAS_ADDINFO != 0 {
            match HeaderGeomType::from_header(header) {
                HeaderGeomType::Point => out.push(self.rank),
                HeaderGeomType::Line => write_string(out, &self.road_ref),
                HeaderGeomType::Area | HeaderGeomType::PointEx => write_string(out, &self.house),
            }
        }
    }
}

/// Population estimate encoded by a settlement rank.
pub fn rank_to_population(rank: u8) -> u64 {
    1.1f64.powi(rank as i32) as u64
}

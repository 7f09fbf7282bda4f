#![allow(dead_code)]

use mwm_coding::{DatVersion, FilesContainer, PointD};
use mwm_format::classifier::ClassifierRegistry;
use mwm_format::feature::builder::{FeatureBuilder, ScaleGeometry};
use mwm_format::feature::names::{lang_index, DEFAULT_CODE, ENGLISH_CODE, INTERNATIONAL_CODE};
use mwm_format::{ArchiveWriter, ContainerMetadata, MetaKind};

pub const CONFIG: &str = "\
# test classification
highway | 00000011111111111111 ; line
  primary
    bridge
  residential | 00000000000011111111
building | 00000000000001111111 ; area
amenity
  cafe
  school
place
  city
";

pub const MAPPING: &str = "\
highway|primary
highway|primary|bridge
highway|residential
building
amenity|cafe
amenity|school
place|city
";

pub const SCALES: [i32; 3] = [5, 10, 17];

pub fn registry() -> ClassifierRegistry {
    ClassifierRegistry::load(CONFIG, MAPPING).expect("test classification")
}

pub fn p(x: f64, y: f64) -> PointD {
    PointD::new(x, y)
}

pub fn approx(a: PointD, b: PointD) -> bool {
    (a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5
}

pub fn line_points() -> Vec<PointD> {
    vec![p(10.0, 10.0), p(10.5, 10.2), p(11.0, 10.1), p(11.5, 10.6), p(12.0, 11.0)]
}

/// Mixed features covering every geometry layout.
pub fn sample_features(reg: &ClassifierRegistry) -> Vec<FeatureBuilder> {
    let t = |path: &[&str]| reg.type_by_path(path).expect("known type");
    vec![
        FeatureBuilder::inner_line_with_masks(line_points(), vec![0, 2, 1])
            .with_type(t(&["highway", "primary"]))
            .with_name(DEFAULT_CODE, "Hauptstrasse")
            .with_name(ENGLISH_CODE, "Main Street")
            .with_road_ref("B 1"),
        FeatureBuilder::outer_line(
            p(20.0, 20.0),
            vec![
                ScaleGeometry::Geometry(vec![p(22.0, 22.0)]),
                ScaleGeometry::Fallback,
                ScaleGeometry::Geometry(vec![p(20.5, 20.7), p(21.0, 21.1), p(22.0, 22.0)]),
            ],
        )
        .with_type(t(&["highway", "primary", "bridge"]))
        .with_type(t(&["highway", "primary"]))
        .with_layer(1),
        FeatureBuilder::point(p(-33.5, 51.25))
            .with_type(t(&["amenity", "cafe"]))
            .with_name(lang_index("de").expect("de"), "Kaffeehaus")
            .with_name(INTERNATIONAL_CODE, "Coffee House")
            .with_meta(MetaKind::Phone, "+49 30 1234")
            .with_meta(MetaKind::OpenHours, "Mo-Fr 08:00-18:00"),
        FeatureBuilder::inner_area(vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(0.0, 2.0)])
            .with_type(t(&["building"]))
            .with_house("12b")
            .with_meta(MetaKind::BuildingLevels, "4"),
        FeatureBuilder::outer_area(vec![
            ScaleGeometry::Absent,
            ScaleGeometry::Geometry(vec![p(5.0, 5.0), p(6.0, 5.0), p(5.0, 6.0)]),
            ScaleGeometry::Geometry(vec![
                p(5.0, 5.0),
                p(6.0, 5.0),
                p(5.0, 6.0),
                p(6.0, 5.0),
                p(6.0, 6.0),
                p(5.0, 6.0),
            ]),
        ])
        .with_type(t(&["amenity", "school"]))
        .with_meta(MetaKind::OpenHours, "Mo-Fr 08:00-18:00"),
        FeatureBuilder::point(p(2.35, 48.85))
            .with_type(t(&["place", "city"]))
            .with_rank(60)
            .with_name(DEFAULT_CODE, "Paris"),
    ]
}

pub fn archive_bytes(reg: &ClassifierRegistry, features: &[FeatureBuilder]) -> Vec<u8> {
    let mut w = ArchiveWriter::new(reg, SCALES.to_vec(), 30, p(0.0, 0.0))
        .expect("writer")
        .with_scale_bits(&[20, 26, 30])
        .expect("scale bits");
    for fb in features {
        w.add_feature(fb).expect("feature");
    }
    w.finish_to_bytes().expect("container")
}

pub fn open(bytes: Vec<u8>) -> ContainerMetadata {
    let container = FilesContainer::from_bytes(bytes).expect("container");
    ContainerMetadata::open(&container, DatVersion::LATEST).expect("metadata")
}

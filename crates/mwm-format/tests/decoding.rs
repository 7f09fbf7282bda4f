//! Whole-container decoding: writer output read back through the decoder.

mod common;

use common::*;
use mwm_coding::{DatVersion, FilesContainer, FilesContainerWriter};
use mwm_format::feature::builder::FeatureBuilder;
use mwm_format::feature::names::{lang_index, DEFAULT_CODE, ENGLISH_CODE};
use mwm_format::{
    ClassifierRegistry, ContainerMetadata, FormatError, GeomType, MetaKind, ScaleRequest,
};

#[test]
fn primary_road_end_to_end() {
    let reg = registry();
    let info = open(archive_bytes(&reg, &sample_features(&reg)));
    assert_eq!(info.scales(), &SCALES);
    assert_eq!(info.features().len(), 6);

    let mut d = info.decoder(0, &reg).unwrap();
    let holder = d.types_holder();
    assert_eq!(holder.geom_type(), GeomType::Line);
    assert!(holder.has(reg.type_by_full_name("highway|primary").unwrap()));
    assert!(holder.has_with_prefix(reg.type_by_full_name("highway").unwrap()));
    assert!(reg.is_drawable(&holder, 12));
    assert!(!reg.is_drawable(&holder, 3));

    // device language missing: default, then international, then English
    assert_eq!(d.readable_name(lang_index("fr").unwrap()), Some("Hauptstrasse"));
    assert_eq!(d.readable_name(ENGLISH_CODE), Some("Main Street"));
    assert_eq!(d.road_ref(), "B 1");

    let pts = d.points(ScaleRequest::Scale(10)).to_vec();
    let all = line_points();
    assert_eq!(pts.len(), 4);
    for (got, want) in pts.iter().zip([all[0], all[1], all[3], all[4]]) {
        assert!(approx(*got, want), "{got} vs {want}");
    }
    let rect = d.limit_rect(10);
    assert!(pts.iter().all(|&q| rect.contains(q)));
}

#[test]
fn inline_point_counts_grow_with_scale_index() {
    let reg = registry();
    let bytes = archive_bytes(&reg, &sample_features(&reg));
    let info = open(bytes);
    let mut prev = 0;
    for scale in SCALES {
        let mut d = info.decoder(0, &reg).unwrap();
        let pts = d.points(scale).to_vec();
        assert!(pts.len() >= prev);
        assert!(approx(pts[0], line_points()[0]));
        assert!(approx(*pts.last().unwrap(), line_points()[4]));
        prev = pts.len();
    }
    assert_eq!(prev, 5);
}

#[test]
fn outer_line_resolves_through_fallback() {
    let reg = registry();
    let info = open(archive_bytes(&reg, &sample_features(&reg)));

    // bucket 1 is a fallback, scale 8 lands on bucket 2
    let mut d = info.decoder(1, &reg).unwrap();
    assert_eq!(d.points(8).len(), 4);
    assert_eq!(d.layer(), 1);
    assert_eq!(d.types().len(), 2);

    let mut d = info.decoder(1, &reg).unwrap();
    assert_eq!(d.points(ScaleRequest::Worst).len(), 2);
    let mut d = info.decoder(1, &reg).unwrap();
    assert_eq!(d.points(ScaleRequest::Best).len(), 4);
    let mut d = info.decoder(1, &reg).unwrap();
    let coarse = d.points(3).to_vec();
    assert_eq!(coarse.len(), 2);
    // bucket 0 is stored on a 20-bit grid
    assert!((coarse[1].x - 22.0).abs() < 1e-3);

    let mut d = info.decoder(1, &reg).unwrap();
    let stats = d.outer_geometry_stats();
    assert_eq!(stats.elements, vec![1, 0, 3]);
    assert!(stats.sizes[0] > 0 && stats.sizes[1] == 0 && stats.sizes[2] > 0);
}

#[test]
fn areas_decode_triangles() {
    let reg = registry();
    let info = open(archive_bytes(&reg, &sample_features(&reg)));

    let mut building = info.decoder(3, &reg).unwrap();
    assert_eq!(building.geom_type(), GeomType::Area);
    assert_eq!(building.triangles_as_points(10).len(), 9);
    assert_eq!(building.house_number(), "12b");

    let mut school = info.decoder(4, &reg).unwrap();
    assert!(school.is_empty_geometry(4));
    let rect = school.limit_rect(4);
    assert_eq!((rect.min_x, rect.max_x), (0.0, 0.0));

    let mut school = info.decoder(4, &reg).unwrap();
    assert_eq!(school.triangles_as_points(10).len(), 3);
    let mut school = info.decoder(4, &reg).unwrap();
    let tri = school.triangles_as_points(ScaleRequest::Best).to_vec();
    assert_eq!(tri.len(), 6);
    assert!(approx(tri[4], p(6.0, 6.0)));
    assert_eq!(school.outer_triangles_stats().elements, vec![0, 1, 2]);
}

#[test]
fn points_carry_names_rank_and_metadata() {
    let reg = registry();
    let info = open(archive_bytes(&reg, &sample_features(&reg)));

    let mut cafe = info.decoder(2, &reg).unwrap();
    assert!(approx(cafe.center(), p(-33.5, 51.25)));
    assert_eq!(cafe.readable_name(lang_index("de").unwrap()), Some("Kaffeehaus"));
    // no default name: international wins over English
    assert_eq!(cafe.readable_name(lang_index("ru").unwrap()), Some("Coffee House"));
    assert_eq!(cafe.metadata_value(MetaKind::Phone), Some("+49 30 1234"));
    assert!(cafe.has_metadata(MetaKind::OpenHours));
    assert!(!cafe.has_metadata(MetaKind::Website));
    assert_eq!(cafe.meta_ids().len(), 2);

    let mut school = info.decoder(4, &reg).unwrap();
    let hours: Vec<u32> = school.meta_ids().iter().map(|&(_, id)| id).collect();
    let cafe_hours = cafe
        .meta_ids()
        .iter()
        .find(|&&(k, _)| k == MetaKind::OpenHours as u8)
        .map(|&(_, id)| id);
    assert_eq!(hours.first().copied(), cafe_hours);

    let mut city = info.decoder(5, &reg).unwrap();
    assert_eq!(city.rank(), 60);
    assert!(city.population() > 250);
    assert_eq!(city.name(DEFAULT_CODE), Some("Paris"));
    assert!(city.metadata().is_empty());
}

#[test]
fn unknown_type_index_decodes_as_stub() {
    let writer_reg = registry();
    let features = vec![FeatureBuilder::point(p(1.0, 2.0))
        .with_type(writer_reg.type_by_full_name("place|city").unwrap())];
    let bytes = archive_bytes(&writer_reg, &features);

    // an older classification knows only the first two mapping entries
    let old = ClassifierRegistry::load(CONFIG, "highway|primary\nhighway|primary|bridge\n").unwrap();
    let info = open(bytes);
    let mut d = info.decoder(0, &old).unwrap();
    assert_eq!(d.types(), &[old.stub_type()]);
    assert!(!d.is_corrupt());
    assert!(approx(d.center(), p(1.0, 2.0)));
}

#[test]
fn newer_container_version_is_rejected() {
    let reg = registry();
    let bytes = archive_bytes(&reg, &sample_features(&reg));
    let original = FilesContainer::from_bytes(bytes).unwrap();

    let mut w = FilesContainerWriter::new(Vec::new());
    for (tag, _) in original.tags() {
        let mut payload = original.section(tag).unwrap().as_bytes().to_vec();
        if tag == "dat" {
            payload[0] = 1;
        }
        w.write_section(tag, &payload).unwrap();
    }
    let patched = FilesContainer::from_bytes(w.finish().unwrap()).unwrap();
    assert!(matches!(
        ContainerMetadata::open(&patched, DatVersion::LATEST),
        Err(FormatError::UnsupportedVersion { found: 1, .. })
    ));
}

#[test]
fn missing_offsets_section_is_a_corrupt_header() {
    let reg = registry();
    let original = FilesContainer::from_bytes(archive_bytes(&reg, &sample_features(&reg))).unwrap();
    let mut w = FilesContainerWriter::new(Vec::new());
    for (tag, _) in original.tags().filter(|(t, _)| *t != "offs") {
        w.write_section(tag, original.section(tag).unwrap().as_bytes()).unwrap();
    }
    let broken = FilesContainer::from_bytes(w.finish().unwrap()).unwrap();
    assert!(matches!(
        ContainerMetadata::open(&broken, DatVersion::LATEST),
        Err(FormatError::CorruptHeader(_))
    ));
}

#[test]
fn container_on_disk_is_memory_mapped() {
    let reg = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Region.mwm");

    let mut w = mwm_format::ArchiveWriter::new(&reg, SCALES.to_vec(), 30, p(0.0, 0.0)).unwrap();
    for fb in sample_features(&reg) {
        w.add_feature(&fb).unwrap();
    }
    w.finish_to_file(&path).unwrap();

    let container = FilesContainer::open(&path).unwrap();
    let info = ContainerMetadata::open(&container, DatVersion::LATEST).unwrap();
    drop(container);
    let mut d = info.decoder(5, &reg).unwrap();
    assert_eq!(d.name(DEFAULT_CODE), Some("Paris"));
}

#[test]
fn writer_rejects_bad_features() {
    let reg = registry();
    let mut w = mwm_format::ArchiveWriter::new(&reg, SCALES.to_vec(), 30, p(0.0, 0.0)).unwrap();
    let primary = reg.type_by_full_name("highway|primary").unwrap();

    let untyped = FeatureBuilder::point(p(0.0, 0.0));
    assert!(w.add_feature(&untyped).is_err());

    let too_long = FeatureBuilder::inner_line((0..16).map(|i| p(i as f64, 0.0)).collect())
        .with_type(primary);
    assert!(w.add_feature(&too_long).is_err());

    let bad_mask = FeatureBuilder::inner_line_with_masks(line_points(), vec![0, 3, 1]).with_type(primary);
    assert!(w.add_feature(&bad_mask).is_err());

    assert!(w.is_empty());
    assert!(mwm_format::ArchiveWriter::new(&reg, vec![10, 5], 30, p(0.0, 0.0)).is_err());
}

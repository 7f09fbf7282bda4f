use anyhow::Result;
use mwm_format::{GeomType, PackedType};
use rustc_hash::FxHashMap;
use tracing::warn;

use super::Archive;

#[derive(Debug, Clone)]
pub struct SectionRow {
    pub tag: String,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct InfoReport {
    pub path: String,
    pub file_bytes: usize,
    pub version: u8,
    pub coord_bits: u8,
    pub scales: Vec<(i32, u8)>,
    pub features: usize,
    pub with_metadata: usize,
    pub sections: Vec<SectionRow>,

    pub points: u64,
    pub lines: u64,
    pub areas: u64,
    pub corrupt: u64,
    // readable type name -> count
    pub top_types: Vec<(String, u64)>,
}

const TOP_TYPES: usize = 20;

pub fn read_info(archive: &Archive) -> Result<InfoReport> {
    let info = &archive.info;
    let mut rep = InfoReport {
        path: archive.path.display().to_string(),
        file_bytes: archive.container.len(),
        version: info.version() as u8,
        coord_bits: info.def_coding_params().coord_bits(),
        scales: (0..info.scale_count())
            .map(|i| (info.scale_at(i), info.coding_params(i).coord_bits()))
            .collect(),
        features: info.features().len(),
        with_metadata: info.meta_deserializer().map_or(0, |m| m.len()),
        sections: archive
            .container
            .tags()
            .map(|(tag, bytes)| SectionRow {
                tag: tag.to_string(),
                bytes,
            })
            .collect(),
        points: 0,
        lines: 0,
        areas: 0,
        corrupt: 0,
        top_types: Vec::new(),
    };

    let mut types: FxHashMap<PackedType, u64> = FxHashMap::default();
    for (id, record) in info.features().iter() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(feature = %id, error = %e, "skipping record");
                rep.corrupt += 1;
                continue;
            }
        };
        let mut d = mwm_format::FeatureDecoder::new(id, record, info, &archive.registry)?;
        match d.geom_type() {
            GeomType::Point => rep.points += 1,
            GeomType::Line => rep.lines += 1,
            GeomType::Area => rep.areas += 1,
        }
        for &t in d.types() {
            *types.entry(t).or_default() += 1;
        }
        if d.is_corrupt() {
            rep.corrupt += 1;
        }
    }

    let mut top: Vec<(PackedType, u64)> = types.into_iter().collect();
    top.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    rep.top_types = top
        .into_iter()
        .take(TOP_TYPES)
        .map(|(t, n)| (archive.registry.readable_name(t), n))
        .collect();
    Ok(rep)
}

pub fn print_info(rep: &InfoReport) {
    println!("path={}", rep.path);
    println!("file_bytes={}", rep.file_bytes);
    println!("version=V{}", rep.version);
    println!("coord_bits={}", rep.coord_bits);
    for (i, (scale, bits)) in rep.scales.iter().enumerate() {
        println!("scale[{i}]={scale} coord_bits={bits}");
    }
    println!("features={}", rep.features);
    println!("features_with_metadata={}", rep.with_metadata);
    println!();

    let total = rep.file_bytes.max(1) as f64;
    for s in &rep.sections {
        println!(
            "{:>14} {:>8.2}%  {}",
            s.bytes,
            s.bytes as f64 * 100.0 / total,
            s.tag
        );
    }
    println!();

    println!("points={}", rep.points);
    println!("lines={}", rep.lines);
    println!("areas={}", rep.areas);
    println!("corrupt={}", rep.corrupt);
    println!();

    println!("top types:");
    for (name, n) in &rep.top_types {
        println!("{n:>14}  {name}");
    }
}

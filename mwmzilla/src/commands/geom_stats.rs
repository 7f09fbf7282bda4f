use anyhow::{Context, Result};
use mwm_format::GeomType;
use std::time::Instant;
use tracing::info;

use super::{fmt_dur, Archive};

#[derive(Default, Debug, Clone)]
pub struct BucketStat {
    pub scale: i32,
    pub line_bytes: u64,
    pub line_points: u64,
    pub lines: u64,
    pub area_bytes: u64,
    pub area_triangles: u64,
    pub areas: u64,
}

#[derive(Default, Debug, Clone)]
pub struct GeomReport {
    pub features: u64,
    pub inner_lines: u64,
    pub outer_lines: u64,
    pub inner_areas: u64,
    pub outer_areas: u64,
    pub buckets: Vec<BucketStat>,
}

pub fn collect_geom_stats(
    archive: &Archive,
    limit: Option<u64>,
    progress_every: u64,
) -> Result<GeomReport> {
    let info = &archive.info;
    let mut rep = GeomReport {
        buckets: info
            .scales()
            .iter()
            .map(|&scale| BucketStat {
                scale,
                ..BucketStat::default()
            })
            .collect(),
        ..GeomReport::default()
    };

    let total = limit.map_or(info.features().len() as u64, |l| {
        l.min(info.features().len() as u64)
    });
    let start = Instant::now();
    let mut next_progress = progress_every.max(1);

    for index in 0..total as u32 {
        let mut d = info
            .decoder(index, &archive.registry)
            .with_context(|| format!("feature #{index}"))?;
        rep.features += 1;

        match d.geom_type() {
            GeomType::Point => {}
            GeomType::Line => {
                let stat = d.outer_geometry_stats();
                if stat.sizes.iter().all(|&s| s == 0) {
                    rep.inner_lines += 1;
                } else {
                    rep.outer_lines += 1;
                }
                for (b, (size, n)) in rep.buckets.iter_mut().zip(stat.sizes.iter().zip(&stat.elements)) {
                    if *size > 0 {
                        b.lines += 1;
                        b.line_bytes += *size as u64;
                        b.line_points += *n as u64;
                    }
                }
            }
            GeomType::Area => {
                let stat = d.outer_triangles_stats();
                if stat.sizes.iter().all(|&s| s == 0) {
                    rep.inner_areas += 1;
                } else {
                    rep.outer_areas += 1;
                }
                for (b, (size, n)) in rep.buckets.iter_mut().zip(stat.sizes.iter().zip(&stat.elements)) {
                    if *size > 0 {
                        b.areas += 1;
                        b.area_bytes += *size as u64;
                        b.area_triangles += *n as u64;
                    }
                }
            }
        }

        if progress_every > 0 && rep.features >= next_progress {
            let elapsed = start.elapsed().as_secs().max(1);
            info!(
                features = rep.features,
                per_s = rep.features as f64 / elapsed as f64,
                elapsed = fmt_dur(elapsed),
                "geom-stats progress"
            );
            next_progress += progress_every;
        }
    }

    info!(
        "geom-stats done features={} outer_lines={} outer_areas={}",
        rep.features, rep.outer_lines, rep.outer_areas
    );
    Ok(rep)
}

pub fn print_geom_stats(rep: &GeomReport) {
    println!("features={}", rep.features);
    println!("lines inner={} outer={}", rep.inner_lines, rep.outer_lines);
    println!("areas inner={} outer={}", rep.inner_areas, rep.outer_areas);
    println!();

    println!(
        "{:>6} {:>10} {:>14} {:>12} {:>10} {:>14} {:>12}",
        "scale", "lines", "line_bytes", "points", "areas", "area_bytes", "triangles"
    );
    for b in &rep.buckets {
        println!(
            "{:>6} {:>10} {:>14} {:>12} {:>10} {:>14} {:>12}",
            b.scale, b.lines, b.line_bytes, b.line_points, b.areas, b.area_bytes, b.area_triangles
        );
    }
}

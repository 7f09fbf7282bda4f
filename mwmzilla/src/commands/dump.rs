use anyhow::{bail, Context, Result};
use mwm_format::feature::names::lang_index;
use mwm_format::{GeomType, ScaleRequest};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Instant,
};
use tracing::info;

use super::{fmt_dur, Archive};

pub fn dump_features(
    archive: &Archive,
    scale: i32,
    lang: &str,
    out: Option<&Path>,
    limit: Option<u64>,
    progress_every: u64,
    with_geometry: bool,
) -> Result<()> {
    let Some(device_lang) = lang_index(lang) else {
        bail!("unknown language code {lang:?}");
    };

    let mut w: Box<dyn Write> = match out {
        Some(p) => Box::new(BufWriter::with_capacity(
            8 << 20,
            File::create(p).with_context(|| format!("create {}", p.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let info = &archive.info;
    let req = ScaleRequest::Scale(scale);
    let total = limit.map_or(info.features().len() as u64, |l| {
        l.min(info.features().len() as u64)
    });
    let start = Instant::now();
    let mut next_progress = progress_every.max(1);

    for index in 0..total as u32 {
        let mut d = info
            .decoder(index, &archive.registry)
            .with_context(|| format!("feature #{index}"))?;

        let mut line = d.debug_string();
        if let Some(name) = d.readable_name(device_lang) {
            line.push_str(&format!(" readable={name:?}"));
        }
        let rect = d.limit_rect(req);
        if !rect.is_empty() {
            line.push_str(&format!(
                " rect=[{:.6},{:.6},{:.6},{:.6}]",
                rect.min_x, rect.min_y, rect.max_x, rect.max_y
            ));
        }
        for (kind, value) in d.metadata().iter() {
            line.push_str(&format!(" {kind}={value:?}"));
        }
        writeln!(w, "{line}")?;

        if with_geometry {
            let pts = match d.geom_type() {
                GeomType::Point => vec![d.center()],
                GeomType::Line => d.points(req).to_vec(),
                GeomType::Area => d.triangles_as_points(req).to_vec(),
            };
            for p in pts {
                writeln!(w, "    {p}")?;
            }
        }

        let done = index as u64 + 1;
        if progress_every > 0 && done >= next_progress {
            let elapsed = start.elapsed().as_secs().max(1);
            info!(
                features = done,
                per_s = done as f64 / elapsed as f64,
                elapsed = fmt_dur(elapsed),
                "dump progress"
            );
            next_progress += progress_every;
        }
    }

    w.flush().context("flush")?;
    info!(features = total, "dump done");
    Ok(())
}

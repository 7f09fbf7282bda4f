use anyhow::{bail, Context, Result};
use mwm_format::{ContainerMetadata, ClassifierRegistry, ScaleRequest};
use rayon::prelude::*;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{error, info};

use super::Archive;

/// Everything a renderer or search index would pull out of one feature.
fn digest(info: &ContainerMetadata, registry: &ClassifierRegistry, index: u32) -> Result<String> {
    let mut d = info.decoder(index, registry)?;
    let mut s = d.debug_string();
    for &t in d.types() {
        let _ = write!(s, " {}", registry.path_by_type(t));
    }
    for scale in [ScaleRequest::Worst, ScaleRequest::Best] {
        let mut d = info.decoder(index, registry)?;
        let _ = write!(s, " {:?}", d.limit_rect(scale));
        let _ = write!(s, " {}", d.points(scale).len() + d.triangles_as_points(scale).len());
    }
    for (kind, value) in d.metadata().iter() {
        let _ = write!(s, " {kind}={value}");
    }
    Ok(s)
}

pub fn stress_decode(archive: &Archive, threads: usize, rounds: usize) -> Result<()> {
    let info = &archive.info;
    let registry = &archive.registry;
    let count = info.features().len() as u32;

    let start = Instant::now();
    let expected = (0..count)
        .map(|i| digest(info, registry, i).with_context(|| format!("feature #{i}")))
        .collect::<Result<Vec<_>>>()?;
    info!(
        features = count,
        secs = start.elapsed().as_secs_f64(),
        "single-threaded pass done"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("build thread pool")?;

    let mismatches = AtomicU64::new(0);
    let decoded = AtomicU64::new(0);
    let start = Instant::now();
    pool.install(|| {
        (0..rounds).into_par_iter().for_each(|round| {
            // each round starts elsewhere so ranges overlap between workers
            let offset = (round as u32).wrapping_mul(7919) % count.max(1);
            (0..count).into_par_iter().for_each(|k| {
                let i = (k + offset) % count;
                decoded.fetch_add(1, Ordering::Relaxed);
                match digest(info, registry, i) {
                    Ok(s) if s == expected[i as usize] => {}
                    Ok(_) => {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                        error!(feature = i, round, "decoded differently from single-threaded pass");
                    }
                    Err(e) => {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                        error!(feature = i, round, error = %e, "decode failed");
                    }
                }
            });
        });
    });

    let decoded = decoded.load(Ordering::Relaxed);
    let elapsed = start.elapsed().as_secs_f64().max(1e-9);
    info!(
        threads = pool.current_num_threads(),
        decoded,
        per_s = decoded as f64 / elapsed,
        "stress done"
    );

    let mismatches = mismatches.load(Ordering::Relaxed);
    if mismatches > 0 {
        bail!("{mismatches} features decoded inconsistently");
    }
    println!("ok: {decoded} decodes over {rounds} rounds matched");
    Ok(())
}

pub mod dump;
pub mod geom_stats;
pub mod info;
pub mod stress;

use anyhow::{Context, Result};
use mwm_coding::{DatVersion, FilesContainer};
use mwm_format::{ClassifierRegistry, ContainerMetadata};
use std::path::{Path, PathBuf};
use tracing::info;

/// Opened container plus the classification it is decoded with.
pub struct Archive {
    pub path: PathBuf,
    pub container: FilesContainer,
    pub info: ContainerMetadata,
    pub registry: ClassifierRegistry,
}

impl Archive {
    pub fn open(path: &Path, classificator: &Path, types: &Path) -> Result<Self> {
        let registry = ClassifierRegistry::load_files(classificator, types).with_context(|| {
            format!(
                "load classification {} / {}",
                classificator.display(),
                types.display()
            )
        })?;
        let container =
            FilesContainer::open(path).with_context(|| format!("open {}", path.display()))?;
        let info = ContainerMetadata::open(&container, DatVersion::LATEST)
            .with_context(|| format!("read header of {}", path.display()))?;
        info!(
            path = %path.display(),
            features = info.features().len(),
            types = registry.len(),
            "archive opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            container,
            info,
            registry,
        })
    }
}

pub(crate) fn fmt_dur(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

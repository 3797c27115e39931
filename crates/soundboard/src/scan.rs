//! One-shot population of the store from the registry directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::RetryPolicy;
use crate::loader::{ClipFileName, ClipLoader};
use crate::registry::SoundStore;

/// Outcome counts of a registry scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files decoded and registered.
    pub loaded: usize,
    /// Files ignored for their name or extension.
    pub ignored: usize,
    /// Files with a supported extension that failed to open or decode.
    pub failed: usize,
}

/// Load every regular file in `dir` into `store`.
///
/// Entries with the same name overwrite each other; per-file problems are
/// logged and skipped. Only failing to list `dir` is an error.
pub fn scan_registry(dir: &Path, store: &SoundStore, loader: &ClipLoader) -> Result<ScanReport> {
    tracing::info!(dir = %dir.display(), "scanning registry for sounds");

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read registry directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut report = ScanReport::default();
    for path in paths {
        let Some(file) = ClipFileName::parse(&path) else {
            tracing::debug!(path = %path.display(), "ignoring invalid sound file");
            report.ignored += 1;
            continue;
        };
        let Some(codec) = file.codec() else {
            tracing::debug!(path = %path.display(), "ignoring file of unknown type");
            report.ignored += 1;
            continue;
        };

        match loader.load(&path, &file.name, codec, RetryPolicy::NONE) {
            Ok(clip) => {
                store.put(clip);
                tracing::info!(name = %file.name, path = %path.display(), "loaded sound");
                report.loaded += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to load sound file: {e:#}");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        loaded = report.loaded,
        ignored = report.ignored,
        failed = report.failed,
        "registry scan complete"
    );
    Ok(report)
}

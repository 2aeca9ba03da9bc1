//! Checkpoint naming and pruning
//!
//! The detection framework writes one weights file per completed epoch into a
//! run directory:
//!
//! ```text
//! <log_dir>/<name><YYYYMMDD>T<HHMM>/mask_rcnn_<name>_<epoch + 1, 4 digits>.h5
//! ```
//!
//! This module reproduces that convention so finished runs can be located and
//! the non-improving tail of a run can be deleted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// Checkpoint file layout of one run directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointLayout {
    run_dir: PathBuf,
    name: String,
}

impl CheckpointLayout {
    /// Layout for checkpoints of experiment `name` inside `run_dir`.
    pub fn new(run_dir: impl Into<PathBuf>, name: &str) -> Self {
        Self { run_dir: run_dir.into(), name: name.to_lowercase() }
    }

    /// Run directory holding the checkpoints
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Checkpoint path for a 0-based epoch (files are numbered from 1).
    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.run_dir.join(format!("mask_rcnn_{}_{:04}.h5", self.name, epoch + 1))
    }

    /// Run tag: the run directory's basename, used to name exported files.
    pub fn run_tag(&self) -> String {
        self.run_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Delete checkpoints of epochs `first..=last`.
    ///
    /// Files that are already gone are logged and skipped; any other removal
    /// failure is logged and reported as missing.
    pub fn prune(&self, first: usize, last: usize) -> CleanupReport {
        let mut report = CleanupReport::default();
        for epoch in first..=last {
            let path = self.checkpoint_path(epoch);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "removed checkpoint");
                    report.removed.push(path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "checkpoint already absent");
                    report.missing.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove checkpoint");
                    report.missing.push(path);
                }
            }
        }
        report
    }
}

/// Outcome of a pruning pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted (usually already absent)
    pub missing: Vec<PathBuf>,
}

/// Name of a new run directory, e.g. `filament20190321T1502`.
pub fn run_dir_name(name: &str, started: NaiveDateTime) -> String {
    format!("{}{}", name.to_lowercase(), started.format("%Y%m%dT%H%M"))
}

/// Newest run directory for `name` under `log_dir`, if any.
pub fn latest_run_dir(log_dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let prefix = name.to_lowercase();
    let entries = std::fs::read_dir(log_dir)
        .map_err(|e| Error::io(format!("listing {}", log_dir.display()), e))?;

    let mut runs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect();
    runs.sort();
    Ok(runs.pop())
}

/// Last checkpoint of the newest run under `log_dir`.
pub fn find_last(log_dir: &Path, name: &str) -> Result<PathBuf> {
    let run_dir = latest_run_dir(log_dir, name)?
        .ok_or_else(|| Error::CheckpointNotFound { dir: log_dir.to_path_buf() })?;

    let prefix = format!("mask_rcnn_{}", name.to_lowercase());
    let entries = std::fs::read_dir(&run_dir)
        .map_err(|e| Error::io(format!("listing {}", run_dir.display()), e))?;
    let mut checkpoints: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect();
    checkpoints.sort();
    checkpoints.pop().ok_or(Error::CheckpointNotFound { dir: run_dir })
}

//! Scratch-file ownership for one image's processing.
//!
//! The host that runs the handler reuses its local filesystem between
//! invocations, so any raster left behind piles up until the disk is full
//! or gets picked up by a later run. Every intermediate file therefore
//! belongs to exactly one [`ResourceTracker`], and the tracker deletes all
//! of them when processing of that image ends:
//!
//! - explicitly, through [`ResourceTracker::release_all`], which returns the
//!   deletion failures so the caller can report them, or
//! - on drop, for any path that unwinds past the explicit release. Failures
//!   there are printed to stderr as warnings.
//!
//! Each artifact is deleted at most once: releasing drains the tracked set.
//!
//! Scratch names come from [`tempfile::Builder`], so two trackers sharing a
//! directory never hand out the same path.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SCRATCH_PREFIX: &str = "face-emoji-";

/// A scratch file that could not be deleted. Never fatal.
#[derive(Error, Debug)]
#[error("Failed to remove scratch file {}: {source}", path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Owns every temporary artifact created while processing one image.
#[derive(Debug)]
pub struct ResourceTracker {
    dir: PathBuf,
    artifacts: Vec<PathBuf>,
}

impl ResourceTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            artifacts: Vec::new(),
        }
    }

    /// Create a new, empty, uniquely named file and start tracking it.
    pub fn allocate(&mut self, suffix: &str) -> io::Result<PathBuf> {
        let path = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.dir)?
            .into_temp_path()
            .keep()?;
        self.register(path.clone());
        Ok(path)
    }

    /// Track an artifact. Returns `false` if it was already tracked.
    pub fn register(&mut self, path: PathBuf) -> bool {
        if self.artifacts.contains(&path) {
            return false;
        }
        self.artifacts.push(path);
        true
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Delete every tracked artifact, continuing past failures.
    pub fn release_all(&mut self) -> Vec<CleanupError> {
        self.artifacts
            .drain(..)
            .filter_map(|path| match std::fs::remove_file(&path) {
                Ok(()) => None,
                Err(source) => Some(CleanupError { path, source }),
            })
            .collect()
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        for failure in self.release_all() {
            eprintln!("warning: {failure}");
        }
    }
}

/// Scratch files from this crate still present in `dir`.
pub fn leftover_artifacts(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(SCRATCH_PREFIX))
        {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

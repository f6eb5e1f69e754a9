//! Output directory cleaning.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::Result,
    graph::{Job, JobOutcome},
};

/// Remove `dir` and everything beneath it.
///
/// Returns whether anything was removed. A missing directory is not an error.
pub fn clean_dir(dir: &Path) -> Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed output directory");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Job wrapper around [`clean_dir`].
#[derive(Debug, Clone)]
pub struct CleanJob {
    dir: PathBuf,
}

impl CleanJob {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Job for CleanJob {
    fn name(&self) -> &str {
        "clean"
    }

    fn run(&self) -> Result<JobOutcome> {
        let summary = if clean_dir(&self.dir)? {
            format!("removed {}", self.dir.display())
        } else {
            format!("{} already absent", self.dir.display())
        };
        Ok(JobOutcome::Succeeded(summary))
    }
}

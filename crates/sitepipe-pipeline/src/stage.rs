//! Pipeline stages.
//!
//! A stage binds one transform to a list of source globs and a destination
//! directory. Transforms compute every output in memory before writing, so a
//! rejected input leaves the stage's previous output in place.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use glob::Pattern;
use tracing::{debug, error};

use crate::{
    error::Result,
    graph::{Job, JobOutcome},
    sources::{SourceSet, compile_patterns},
};

/// The four content stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Styles,
    Scripts,
    Images,
    Templates,
}

impl StageKind {
    /// All kinds, in the order stages are declared.
    pub const ALL: [StageKind; 4] = [Self::Styles, Self::Scripts, Self::Images, Self::Templates];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Styles => "styles",
            Self::Scripts => "scripts",
            Self::Images => "images",
            Self::Templates => "templates",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage does when its transform rejects an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the error and complete as failed; the caller keeps going.
    Recover,
    /// Propagate the error and abort the surrounding pipeline.
    Abort,
}

/// Counts reported by a transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Source files consumed.
    pub inputs: usize,
    /// Files written beneath the destination.
    pub outputs: usize,
    /// Bytes written.
    pub bytes: u64,
}

/// One source-to-destination transform.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Turn `sources` into files beneath `dest`.
    fn apply(&self, sources: &SourceSet, dest: &Path) -> Result<StageReport>;
}

/// A named transform step.
#[derive(Debug)]
pub struct Stage {
    kind: StageKind,
    root: PathBuf,
    sources: Vec<String>,
    dest: PathBuf,
    transform: Box<dyn Transform>,
    policy: FailurePolicy,
}

impl Stage {
    /// Create a stage that aborts on failure.
    pub fn new(
        kind: StageKind,
        root: impl Into<PathBuf>,
        sources: Vec<String>,
        dest: impl Into<PathBuf>,
        transform: impl Transform + 'static,
    ) -> Self {
        Self {
            kind,
            root: root.into(),
            sources,
            dest: dest.into(),
            transform: Box::new(transform),
            policy: FailurePolicy::Abort,
        }
    }

    /// Set the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Project-relative source globs.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Matchers for the source globs, used to route file events.
    pub fn patterns(&self) -> Result<Vec<Pattern>> {
        compile_patterns(&self.sources)
    }

    /// Resolve sources and apply the transform, ignoring the failure policy.
    pub fn execute(&self) -> Result<StageReport> {
        let sources = SourceSet::resolve(&self.root, &self.sources)?;
        debug!(stage = self.name(), files = sources.len(), "resolved sources");

        let mut report = self
            .transform
            .apply(&sources, &self.dest)
            .map_err(|e| e.in_stage(self.name()))?;
        report.inputs = sources.len();
        Ok(report)
    }
}

impl Job for Stage {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn run(&self) -> Result<JobOutcome> {
        match self.execute() {
            Ok(report) => Ok(JobOutcome::Succeeded(format!(
                "{} inputs, {} outputs, {} bytes",
                report.inputs, report.outputs, report.bytes
            ))),
            Err(err) if err.is_transform() && self.policy == FailurePolicy::Recover => {
                error!(stage = self.name(), "{err}");
                Ok(JobOutcome::Recovered(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: &[u8]) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(contents.len() as u64)
}

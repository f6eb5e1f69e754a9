//! Script bundling.

use std::{fs, path::Path};

use minify_js::{Session, TopLevelMode};
use tracing::debug;

use crate::{
    error::{PipelineError, Result},
    sources::SourceSet,
    stage::{StageReport, Transform, write_output},
};

/// Concatenates scripts in source order into one bundle.
#[derive(Debug, Clone)]
pub struct ScriptsTransform {
    output: String,
    minify: bool,
}

impl ScriptsTransform {
    #[must_use]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            minify: false,
        }
    }

    /// Minify each script before it is appended.
    #[must_use]
    pub fn minified(mut self) -> Self {
        self.minify = true;
        self
    }
}

fn minify(path: &Path, source: &[u8]) -> Result<Vec<u8>> {
    let session = Session::new();
    let mut out = Vec::with_capacity(source.len());
    minify_js::minify(&session, TopLevelMode::Global, source, &mut out)
        .map_err(|e| PipelineError::transform(path, e.to_string()))?;
    Ok(out)
}

impl Transform for ScriptsTransform {
    fn apply(&self, sources: &SourceSet, dest: &Path) -> Result<StageReport> {
        let mut bundle = Vec::new();
        for file in sources.iter() {
            let source = fs::read(&file.path)?;
            let chunk = if self.minify {
                minify(&file.path, &source)?
            } else {
                source
            };

            bundle.extend_from_slice(&chunk);
            if self.minify {
                bundle.push(b';');
            }
            if !bundle.ends_with(b"\n") {
                bundle.push(b'\n');
            }
            debug!(path = %file.path.display(), bytes = chunk.len(), "appended script");
        }

        let bytes = write_output(&dest.join(&self.output), &bundle)?;
        Ok(StageReport {
            inputs: sources.len(),
            outputs: 1,
            bytes,
        })
    }
}

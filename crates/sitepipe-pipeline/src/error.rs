//! Pipeline errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving sources, running stages or executing the
/// task graph.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A transform collaborator rejected its input. The message is the
    /// collaborator's own diagnostic.
    #[error("{stage} failed on {}: {message}", path.display())]
    Transform {
        stage: String,
        path: PathBuf,
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid glob pattern.
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A directory could not be read while expanding a glob.
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),

    /// A job panicked or was cancelled by the runtime.
    #[error("job {job} did not complete: {message}")]
    Aborted { job: String, message: String },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a transform error for `path`. The owning stage fills in its
    /// name when the error leaves it.
    pub fn transform(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Transform {
            stage: String::new(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this is a rejected input rather than a resource failure.
    #[must_use]
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }

    pub(crate) fn in_stage(self, name: &str) -> Self {
        match self {
            Self::Transform { path, message, .. } => Self::Transform {
                stage: name.to_string(),
                path,
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_carries_stage_and_path() {
        let err = PipelineError::transform("src/scss/a.scss", "expected \";\".").in_stage("styles");
        let msg = err.to_string();

        assert!(err.is_transform());
        assert!(msg.starts_with("styles failed on src/scss/a.scss"));
        assert!(msg.contains("expected \";\"."));
    }

    #[test]
    fn test_io_error_is_not_transform() {
        let err: PipelineError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into();

        assert!(!err.is_transform());
        assert_eq!(err.to_string(), "IO error: read-only");
    }
}

//! Glob expansion into ordered source sets.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use glob::{MatchOptions, Pattern};
use sitepipe_core::glob_base;
use tracing::trace;

use crate::error::Result;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// One matched input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the literal base of the glob that matched it.
    pub relative: PathBuf,
}

/// Files matched by a list of globs, in glob order.
///
/// Files within one glob are sorted. A file matched by several globs keeps
/// the position of the first one, which is what puts `vendor/` scripts ahead
/// of application scripts.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    files: Vec<SourceFile>,
}

impl SourceSet {
    /// Expand `patterns` relative to `root`.
    pub fn resolve(root: &Path, patterns: &[String]) -> Result<Self> {
        let escaped_root = Pattern::escape(&root.to_string_lossy());
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in patterns {
            let base = root.join(glob_base(pattern));
            let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern);

            let mut matched = Vec::new();
            for entry in glob::glob_with(&full, MATCH_OPTIONS)? {
                let path = entry?;
                if path.is_file() {
                    matched.push(path);
                }
            }
            matched.sort();

            trace!(pattern, count = matched.len(), "expanded glob");

            for path in matched {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let relative = path
                    .strip_prefix(&base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
                files.push(SourceFile { path, relative });
            }
        }

        Ok(Self { files })
    }

    #[must_use]
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Sass-style partials (`_mixins.scss`) are only reachable through imports.
#[must_use]
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('_'))
}

/// Compile the globs into matchers for event routing.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(Into::into))
        .collect()
}

/// Whether a project-relative path matches any of `patterns`.
#[must_use]
pub fn matches_any(patterns: &[Pattern], relative: &Path) -> bool {
    patterns
        .iter()
        .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
}

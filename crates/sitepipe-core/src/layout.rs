//! Build modes and the output tree each one writes.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::config::Config;

/// Which pipeline runs, and where it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Preview build: served, watched, reloaded.
    Develop,
    /// Release build: purged, minified, compressed.
    Produce,
}

impl BuildMode {
    /// Lowercase name, also exposed to templates as `{{ mode }}`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Develop => "develop",
            Self::Produce => "produce",
        }
    }

    /// Whether this mode produces release artifacts.
    #[must_use]
    pub fn is_release(self) -> bool {
        matches!(self, Self::Produce)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute output locations for one build mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    mode: BuildMode,
    output: PathBuf,
}

impl Layout {
    /// Resolve the output tree for `mode` against the project root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: &Config, mode: BuildMode) -> Self {
        let root = root.into();
        let output = match mode {
            BuildMode::Develop => root.join(&config.build.develop_dir),
            BuildMode::Produce => root.join(&config.build.release_dir),
        };
        Self { root, mode, output }
    }

    /// Project root that all configured globs are relative to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Output root; rendered markup lands here directly.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    #[must_use]
    pub fn css_dir(&self) -> PathBuf {
        self.output.join("css")
    }

    #[must_use]
    pub fn js_dir(&self) -> PathBuf {
        self.output.join("js")
    }

    #[must_use]
    pub fn img_dir(&self) -> PathBuf {
        self.output.join("img")
    }

    /// Resolve a project-relative path.
    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_use_separate_roots() {
        let config = Config::default();
        let develop = Layout::new("/site", &config, BuildMode::Develop);
        let produce = Layout::new("/site", &config, BuildMode::Produce);

        assert_eq!(develop.output_dir(), Path::new("/site/dist"));
        assert_eq!(produce.output_dir(), Path::new("/site/build"));
        assert_ne!(develop.css_dir(), produce.css_dir());
    }

    #[test]
    fn test_subdirectories() {
        let layout = Layout::new("/site", &Config::default(), BuildMode::Develop);

        assert_eq!(layout.css_dir(), PathBuf::from("/site/dist/css"));
        assert_eq!(layout.js_dir(), PathBuf::from("/site/dist/js"));
        assert_eq!(layout.img_dir(), PathBuf::from("/site/dist/img"));
        assert_eq!(layout.resolve("src"), PathBuf::from("/site/src"));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(BuildMode::Develop.to_string(), "develop");
        assert_eq!(BuildMode::Produce.as_str(), "produce");
        assert!(BuildMode::Produce.is_release());
        assert!(!BuildMode::Develop.is_release());
    }
}

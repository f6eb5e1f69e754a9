//! Orchestration context shared by the commands.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use color_eyre::eyre::{Result, WrapErr};
use sitepipe_core::{BuildMode, Config, Layout};
use sitepipe_pipeline::Pipeline;

use crate::server::{LIVERELOAD_SCRIPT, ServerState};

/// Everything a command needs, built once at startup.
#[derive(Debug)]
pub struct BuildContext {
    config: Config,
    pipeline: Pipeline,
    preview: Arc<ServerState>,
}

impl BuildContext {
    /// Load configuration and assemble the pipeline for `mode`.
    ///
    /// The project root is the directory containing the config file.
    pub fn load(config_path: &Path, mode: BuildMode) -> Result<Self> {
        let config = Config::load_with_env(config_path)
            .wrap_err_with(|| format!("Failed to load configuration from {}", config_path.display()))?;
        let root = project_root(config_path)?;
        tracing::info!(root = %root.display(), %mode, "loaded configuration");
        Ok(Self::new(config, root, mode))
    }

    /// Assemble the context from an already validated config.
    #[must_use]
    pub fn new(config: Config, root: PathBuf, mode: BuildMode) -> Self {
        let layout = Layout::new(root, &config, mode);
        let pipeline = Pipeline::new(&config, layout, Some(LIVERELOAD_SCRIPT));
        Self {
            config,
            pipeline,
            preview: Arc::new(ServerState::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        self.pipeline.layout()
    }

    /// Reload channel of the preview server.
    #[must_use]
    pub fn preview(&self) -> Arc<ServerState> {
        Arc::clone(&self.preview)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.watch.debounce_ms)
    }
}

/// Absolute directory of the config file, or the working directory.
fn project_root(config_path: &Path) -> Result<PathBuf> {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().wrap_err("Failed to read current directory")?,
    };
    dir.canonicalize()
        .wrap_err_with(|| format!("Project directory {} not found", dir.display()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let ctx = BuildContext::load(&dir.path().join("sitepipe.toml"), BuildMode::Develop).unwrap();

        assert_eq!(ctx.config().server.port, 5000);
        assert_eq!(ctx.debounce(), Duration::from_millis(200));
        assert!(ctx.layout().output_dir().ends_with("dist"));
        assert_eq!(ctx.pipeline().stages().len(), 4);
    }

    #[test]
    fn test_root_is_config_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("site.toml"),
            "[build]\nrelease_dir = \"out\"\n",
        )
        .unwrap();

        let ctx = BuildContext::load(&dir.path().join("site.toml"), BuildMode::Produce).unwrap();

        assert_eq!(ctx.layout().root(), dir.path().canonicalize().unwrap());
        assert!(ctx.layout().output_dir().ends_with("out"));
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("sitepipe.toml"),
            "[build]\ndevelop_dir = \"out\"\nrelease_dir = \"out/release\"\n",
        )
        .unwrap();

        let err = BuildContext::load(&dir.path().join("sitepipe.toml"), BuildMode::Develop).unwrap_err();
        assert!(format!("{err:?}").contains("Overlapping"));
    }
}

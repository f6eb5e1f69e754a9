//! Pipeline configuration management.
//!
//! Every setting has a default, so a project with the conventional
//! `src/{scss,js,img}` layout builds without any configuration file.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Default configuration file name, looked up in the project root.
pub const DEFAULT_CONFIG_FILE: &str = "sitepipe.toml";

/// Prefix for environment variable overrides (`SITEPIPE_SERVER__PORT=5050`).
pub const ENV_PREFIX: &str = "SITEPIPE";

/// Main configuration structure for sitepipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output roots for both build modes.
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// File watcher settings.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Stylesheet stage settings.
    #[serde(default)]
    pub styles: StylesConfig,

    /// Script stage settings.
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Image stage settings.
    #[serde(default)]
    pub images: ImagesConfig,

    /// Template stage settings.
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Output directories, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output root for `develop`.
    #[serde(default = "default_develop_dir")]
    pub develop_dir: PathBuf,

    /// Output root for `produce`.
    #[serde(default = "default_release_dir")]
    pub release_dir: PathBuf,
}

/// Preview server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Fixed port; startup fails if it is taken.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// File watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Window in which rapid file events are coalesced into one batch.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Stylesheet stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Source globs. Files whose name starts with `_` are partials and are
    /// only reachable through `@use`/`@import`.
    #[serde(default = "default_style_sources")]
    pub sources: Vec<String>,

    /// Name of the concatenated stylesheet inside `css/`.
    #[serde(default = "default_style_output")]
    pub output: String,

    /// Browserslist queries used for vendor prefixing.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Globs scanned for class names when purging in `produce`.
    #[serde(default = "default_purge_content")]
    pub purge_content: Vec<String>,

    /// Class and id names that are never purged.
    #[serde(default)]
    pub safelist: Vec<String>,
}

/// Script stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Source globs, concatenated in this order.
    #[serde(default = "default_script_sources")]
    pub sources: Vec<String>,

    /// Name of the bundle inside `js/`.
    #[serde(default = "default_script_output")]
    pub output: String,
}

/// Image stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Source globs.
    #[serde(default = "default_image_sources")]
    pub sources: Vec<String>,
}

/// Template stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Source globs.
    #[serde(default = "default_template_sources")]
    pub sources: Vec<String>,

    /// Directories searched by `{% include %}` after the including file's own
    /// directory.
    #[serde(default = "default_include_dirs")]
    pub include_dirs: Vec<PathBuf>,

    /// Extension of renderable templates.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Variables available to every template.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

// Default value functions
fn default_develop_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_release_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_style_sources() -> Vec<String> {
    vec!["src/scss/**/*".to_string()]
}

fn default_style_output() -> String {
    "styles.css".to_string()
}

fn default_browsers() -> Vec<String> {
    vec!["defaults".to_string()]
}

fn default_purge_content() -> Vec<String> {
    vec!["src/**/*.html".to_string(), "src/**/*.js".to_string()]
}

fn default_script_sources() -> Vec<String> {
    vec![
        "src/js/vendor/**/*.js".to_string(),
        "src/js/**/*.js".to_string(),
    ]
}

fn default_script_output() -> String {
    "scripts.js".to_string()
}

fn default_image_sources() -> Vec<String> {
    vec!["src/img/**/*".to_string()]
}

fn default_template_sources() -> Vec<String> {
    vec!["src/**/*.html".to_string()]
}

fn default_include_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_extension() -> String {
    "html".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            develop_dir: default_develop_dir(),
            release_dir: default_release_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            sources: default_style_sources(),
            output: default_style_output(),
            browsers: default_browsers(),
            purge_content: default_purge_content(),
            safelist: Vec::new(),
        }
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: default_script_sources(),
            output: default_script_output(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sources: default_image_sources(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            sources: default_template_sources(),
            include_dirs: default_include_dirs(),
            extension: default_extension(),
            vars: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file that must exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file plus `SITEPIPE_*` environment
    /// overrides. A missing file yields the defaults.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let stage_sources = [
            ("styles", &self.styles.sources),
            ("scripts", &self.scripts.sources),
            ("images", &self.images.sources),
            ("templates", &self.templates.sources),
        ];
        for (name, sources) in stage_sources {
            if sources.is_empty() {
                return Err(CoreError::config(format!(
                    "{name}.sources must list at least one glob"
                )));
            }
        }

        if self.styles.output.trim().is_empty() {
            return Err(CoreError::config("styles.output cannot be empty"));
        }
        if self.scripts.output.trim().is_empty() {
            return Err(CoreError::config("scripts.output cannot be empty"));
        }
        if self.templates.extension.trim().is_empty() {
            return Err(CoreError::config("templates.extension cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(CoreError::config("server.port cannot be 0"));
        }
        if self.watch.debounce_ms == 0 {
            tracing::warn!("watch.debounce_ms is 0, every file event triggers a rebuild");
        }

        self.validate_isolation()
    }

    /// Output roots must not overlap each other or any source tree.
    fn validate_isolation(&self) -> Result<()> {
        let develop = normalize(&self.build.develop_dir);
        let release = normalize(&self.build.release_dir);

        if develop.starts_with(&release) || release.starts_with(&develop) {
            return Err(CoreError::overlap(
                &self.build.develop_dir,
                &self.build.release_dir,
            ));
        }

        for pattern in self.source_globs() {
            let base = normalize(&glob_base(pattern));
            // A root-level non-recursive glob never descends into an output dir.
            if base.as_os_str().is_empty() && !pattern.contains("**") {
                continue;
            }
            for output in [&develop, &release] {
                if output.starts_with(&base) {
                    return Err(CoreError::overlap(output, pattern));
                }
            }
        }

        Ok(())
    }

    /// Every glob the pipeline reads from, stage sources first.
    pub fn source_globs(&self) -> impl Iterator<Item = &str> {
        self.styles
            .sources
            .iter()
            .chain(&self.scripts.sources)
            .chain(&self.images.sources)
            .chain(&self.templates.sources)
            .chain(&self.styles.purge_content)
            .map(String::as_str)
    }

    /// Address the preview server binds to.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// The literal directory prefix of a glob pattern.
///
/// `src/js/**/*.js` has base `src/js`; `*.html` has an empty base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for segment in pattern.split('/') {
        if segment.contains(['*', '?', '[', '{']) {
            return base;
        }
        base.push(segment);
    }
    // A pattern without wildcards names a single file; its base is the parent.
    base.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

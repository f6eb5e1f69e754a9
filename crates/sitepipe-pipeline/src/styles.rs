//! Stylesheet compilation.

use std::path::{Path, PathBuf};

use lightningcss::{
    rules::{CssRule, CssRuleList},
    stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use tracing::{debug, info};

use crate::{
    error::{PipelineError, Result},
    purge::{ContentTokens, prune_selectors, unused_symbols},
    sources::{SourceSet, is_partial},
    stage::{StageReport, Transform, write_output},
    templates::TemplateTransform,
};

const STYLE_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// Content used to decide which selectors survive.
#[derive(Debug, Clone)]
pub struct PurgeOptions {
    /// Project root the content globs are relative to.
    pub root: PathBuf,
    /// Globs of markup and script files to scan.
    pub content: Vec<String>,
    /// Class and id names kept regardless of content.
    pub safelist: Vec<String>,
    /// Templates rendered in memory so that substituted names count as used.
    pub pages: Option<RenderedPages>,
}

/// Pages to render and scan alongside the raw content files.
#[derive(Debug, Clone)]
pub struct RenderedPages {
    /// Template globs, relative to the purge root.
    pub sources: Vec<String>,
    pub templates: TemplateTransform,
}

impl PurgeOptions {
    fn tokens(&self) -> Result<ContentTokens> {
        let content = SourceSet::resolve(&self.root, &self.content)?;
        let mut tokens = ContentTokens::scan(&content)?;
        if let Some(pages) = &self.pages {
            let sources = SourceSet::resolve(&self.root, &pages.sources)?;
            for (_, html) in pages.templates.render_pages(&sources)? {
                tokens.extend_from(&html);
            }
        }
        tokens.extend_safelist(&self.safelist);
        Ok(tokens)
    }
}

/// Compiles every non-partial stylesheet into one prefixed output file.
#[derive(Debug, Clone)]
pub struct StylesTransform {
    output: String,
    browsers: Vec<String>,
    purge: Option<PurgeOptions>,
    minify: bool,
}

impl StylesTransform {
    /// Expanded output for the given browserslist queries.
    #[must_use]
    pub fn new(output: impl Into<String>, browsers: Vec<String>) -> Self {
        Self {
            output: output.into(),
            browsers,
            purge: None,
            minify: false,
        }
    }

    /// Drop rules for selectors that never appear in the purge content.
    #[must_use]
    pub fn with_purge(mut self, purge: PurgeOptions) -> Self {
        self.purge = Some(purge);
        self
    }

    /// Print minified output.
    #[must_use]
    pub fn minified(mut self) -> Self {
        self.minify = true;
        self
    }

    fn targets(&self, out: &Path) -> Result<Targets> {
        if self.browsers.is_empty() {
            return Ok(Targets::default());
        }
        let browsers = Browsers::from_browserslist(&self.browsers)
            .map_err(|e| PipelineError::transform(out, format!("invalid browser targets: {e}")))?;
        Ok(browsers.map(Targets::from).unwrap_or_default())
    }
}

/// Compile one Sass, SCSS or CSS file. Imports resolve relative to the file.
fn compile(path: &Path) -> Result<String> {
    grass::from_path(path, &grass::Options::default())
        .map_err(|e| PipelineError::transform(path, e.to_string()))
}

/// Join compiled sheets into one, moving every `@import` ahead of the other
/// rules so that an import in a later file stays valid.
fn merge<'i>(compiled: &'i [(String, String)], output: &str) -> Result<StyleSheet<'i>> {
    let mut imports = Vec::new();
    let mut rules = Vec::new();
    let mut names = Vec::with_capacity(compiled.len());

    for (index, (name, css)) in compiled.iter().enumerate() {
        let sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: name.clone(),
                source_index: index as u32,
                ..ParserOptions::default()
            },
        )
        .map_err(|e| PipelineError::transform(Path::new(name), e.to_string()))?;

        for rule in sheet.rules.0 {
            match rule {
                CssRule::Import(_) => imports.push(rule),
                _ => rules.push(rule),
            }
        }
        names.push(name.clone());
    }

    if names.is_empty() {
        names.push(output.to_string());
    }
    imports.extend(rules);
    Ok(StyleSheet::new(
        names,
        CssRuleList(imports),
        ParserOptions {
            filename: output.to_string(),
            ..ParserOptions::default()
        },
    ))
}

impl Transform for StylesTransform {
    fn apply(&self, sources: &SourceSet, dest: &Path) -> Result<StageReport> {
        let out = dest.join(&self.output);

        let mut compiled = Vec::new();
        for file in sources.iter() {
            let is_style = file
                .path
                .extension()
                .is_some_and(|ext| STYLE_EXTENSIONS.iter().any(|s| ext == *s));
            if !is_style || is_partial(&file.path) {
                continue;
            }
            compiled.push((file.path.display().to_string(), compile(&file.path)?));
            debug!(path = %file.path.display(), "compiled stylesheet");
        }

        let targets = self.targets(&out)?;
        let mut sheet = merge(&compiled, &self.output)?;

        let unused = match &self.purge {
            Some(purge) => {
                let tokens = purge.tokens()?;
                let unused = unused_symbols(&sheet, &tokens, &out)?;
                let removed = prune_selectors(&mut sheet, &unused, &out)?;
                info!(unused = unused.len(), removed, "purged unused selectors");
                unused
            }
            None => Default::default(),
        };

        sheet
            .minify(MinifyOptions {
                targets,
                unused_symbols: unused,
            })
            .map_err(|e| PipelineError::transform(&out, e.to_string()))?;

        let result = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| PipelineError::transform(&out, e.to_string()))?;

        let bytes = write_output(&out, result.code.as_bytes())?;
        Ok(StageReport {
            inputs: compiled.len(),
            outputs: 1,
            bytes,
        })
    }
}

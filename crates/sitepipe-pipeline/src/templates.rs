//! Markup template rendering.
//!
//! A lightweight interpolation syntax rather than a full template engine:
//!
//! - `{{ name }}` substitutes a variable and fails if it is missing
//! - `{{ name? }}` substitutes a variable or nothing
//! - `{% include "partial.html" %}` inlines another template, looked up next
//!   to the including file and then in the include directories

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

use crate::{
    error::PipelineError,
    sources::{SourceSet, is_partial},
    stage::{StageReport, Transform, write_output},
};

/// Includes nested deeper than this are treated as a cycle.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Included template not found.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Invalid template syntax.
    #[error("invalid template syntax in {template}: {message}")]
    InvalidSyntax { template: String, message: String },

    /// Include chain too deep, usually a cycle.
    #[error("include depth exceeded {max} at {0}", max = MAX_INCLUDE_DEPTH)]
    IncludeDepth(String),

    /// IO error while reading a template.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Template context with variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Create context with initial variables.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a variable value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }
}

/// Renders templates against a context and a set of include directories.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    context: TemplateContext,
    include_dirs: Vec<PathBuf>,
}

impl Renderer {
    #[must_use]
    pub fn new(context: TemplateContext, include_dirs: Vec<PathBuf>) -> Self {
        Self {
            context,
            include_dirs,
        }
    }

    /// Read and render the template at `path`.
    pub fn render_file(&self, path: &Path) -> Result<String> {
        let content = read_template(path)?;
        self.render(&path.display().to_string(), &content, path.parent(), 0)
    }

    /// Render `content`. `dir` is searched first for includes.
    pub fn render_str(&self, name: &str, content: &str, dir: Option<&Path>) -> Result<String> {
        self.render(name, content, dir, 0)
    }

    fn render(&self, name: &str, content: &str, dir: Option<&Path>, depth: usize) -> Result<String> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(TemplateError::IncludeDepth(name.to_string()));
        }

        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = next_tag(rest) {
            result.push_str(&rest[..start]);
            let tag = &rest[start..];

            if let Some(body) = tag.strip_prefix("{{") {
                let end = body.find("}}").ok_or_else(|| syntax(name, "unclosed {{ delimiter"))?;
                result.push_str(&self.variable(body[..end].trim())?);
                rest = &body[end + 2..];
            } else {
                let body = &tag[2..];
                let end = body.find("%}").ok_or_else(|| syntax(name, "unclosed {% delimiter"))?;
                let directive = body[..end].trim();
                let target = parse_include(directive).ok_or_else(|| {
                    syntax(name, format!("unknown directive `{directive}`"))
                })?;
                let path = self.resolve_include(target, dir)?;
                debug!(template = name, include = %path.display(), "including template");
                let included = read_template(&path)?;
                result.push_str(&self.render(
                    &path.display().to_string(),
                    &included,
                    path.parent(),
                    depth + 1,
                )?);
                rest = &body[end + 2..];
            }
        }

        result.push_str(rest);
        Ok(result)
    }

    fn variable(&self, expr: &str) -> Result<String> {
        // Optional variable syntax: {{ variable? }}
        let (var_name, optional) = match expr.strip_suffix('?') {
            Some(stripped) => (stripped.trim(), true),
            None => (expr, false),
        };

        match self.context.get(var_name) {
            Some(v) => Ok(v.to_string()),
            None if optional => Ok(String::new()),
            None => Err(TemplateError::MissingVariable(var_name.to_string())),
        }
    }

    fn resolve_include(&self, target: &str, dir: Option<&Path>) -> Result<PathBuf> {
        dir.into_iter()
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|d| d.join(target))
            .find(|p| p.is_file())
            .ok_or_else(|| TemplateError::NotFound(target.to_string()))
    }
}

fn next_tag(s: &str) -> Option<usize> {
    match (s.find("{{"), s.find("{%")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// `include "file"` or `include 'file'`.
fn parse_include(directive: &str) -> Option<&str> {
    let arg = directive.strip_prefix("include")?.trim();
    let quote = arg.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = arg[1..].strip_suffix(quote)?;
    (!inner.is_empty()).then_some(inner)
}

fn syntax(template: &str, message: impl Into<String>) -> TemplateError {
    TemplateError::InvalidSyntax {
        template: template.to_string(),
        message: message.into(),
    }
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders every non-partial template with the configured extension,
/// preserving paths relative to the glob base.
#[derive(Debug, Clone)]
pub struct TemplateTransform {
    renderer: Renderer,
    extension: String,
    inject: Option<String>,
}

impl TemplateTransform {
    #[must_use]
    pub fn new(renderer: Renderer, extension: impl Into<String>) -> Self {
        Self {
            renderer,
            extension: extension.into(),
            inject: None,
        }
    }

    /// Insert `snippet` before `</body>` in every rendered page.
    #[must_use]
    pub fn with_injection(mut self, snippet: impl Into<String>) -> Self {
        self.inject = Some(snippet.into());
        self
    }

    fn finish(&self, html: String) -> String {
        match &self.inject {
            Some(snippet) if !html.contains(snippet.as_str()) => inject_before_body(&html, snippet),
            _ => html,
        }
    }

    /// Render every page in `sources` without writing anything.
    ///
    /// Pages are keyed by their path relative to the glob base.
    pub fn render_pages(&self, sources: &SourceSet) -> crate::error::Result<Vec<(PathBuf, String)>> {
        let mut rendered = Vec::new();
        for file in sources.iter() {
            let renderable = file
                .path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension));
            if !renderable || is_partial(&file.path) {
                continue;
            }

            let html = self
                .renderer
                .render_file(&file.path)
                .map_err(|e| PipelineError::transform(&file.path, e.to_string()))?;
            rendered.push((file.relative.clone(), self.finish(html)));
        }
        Ok(rendered)
    }
}

impl Transform for TemplateTransform {
    fn apply(&self, sources: &SourceSet, dest: &Path) -> crate::error::Result<StageReport> {
        let rendered = self.render_pages(sources)?;

        let mut report = StageReport::default();
        for (relative, html) in rendered {
            report.bytes += write_output(&dest.join(relative), html.as_bytes())?;
            report.outputs += 1;
        }
        Ok(report)
    }
}

/// Insert `snippet` before the last `</body>`, or append it.
fn inject_before_body(html: &str, snippet: &str) -> String {
    match html.rfind("</body>") {
        Some(idx) => format!("{}{snippet}{}", &html[..idx], &html[idx..]),
        None => format!("{html}{snippet}"),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn renderer() -> Renderer {
        Renderer::default()
    }

    #[test]
    fn test_template_simple_render() {
        let ctx = TemplateContext::new().with_var("name", "World");
        let result = Renderer::new(ctx, Vec::new())
            .render_str("test", "Hello, {{ name }}!", None)
            .unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_template_multiple_variables() {
        let ctx = TemplateContext::new()
            .with_var("greeting", "Hello")
            .with_var("name", "User")
            .with_var("place", "sitepipe");

        let result = Renderer::new(ctx, Vec::new())
            .render_str("test", "{{ greeting }}, {{name}}! Welcome to {{ place }}.", None)
            .unwrap();
        assert_eq!(result, "Hello, User! Welcome to sitepipe.");
    }

    #[test]
    fn test_template_optional_variable() {
        let result = renderer().render_str("test", "Hello{{ suffix? }}!", None).unwrap();
        assert_eq!(result, "Hello!");

        let ctx = TemplateContext::new().with_var("suffix", ", World");
        let result = Renderer::new(ctx, Vec::new())
            .render_str("test", "Hello{{ suffix? }}!", None)
            .unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_template_missing_required_variable() {
        let result = renderer().render_str("test", "Hello, {{ name }}!", None);
        assert!(matches!(result, Err(TemplateError::MissingVariable(_))));
    }

    #[test]
    fn test_unclosed_delimiters_are_syntax_errors() {
        let err = renderer().render_str("page.html", "<p>{{ title </p>", None).unwrap_err();
        assert!(err.to_string().contains("unclosed {{"));
        assert!(err.to_string().contains("page.html"));

        let err = renderer().render_str("page.html", "{% include \"a.html\"", None).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidSyntax { .. }));
    }

    #[test]
    fn test_unknown_directive() {
        let err = renderer().render_str("page.html", "{% for x in y %}", None).unwrap_err();
        assert!(err.to_string().contains("unknown directive `for x in y`"));
    }

    #[test]
    fn test_include_from_own_directory_then_include_dirs() {
        let dir = TempDir::new().unwrap();
        let partials = dir.path().join("partials");
        fs::create_dir_all(&partials).unwrap();
        fs::write(partials.join("_nav.html"), "<nav>{{ title }}</nav>").unwrap();
        fs::write(dir.path().join("_footer.html"), "<footer></footer>").unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "{% include \"_nav.html\" %}<main></main>{% include '_footer.html' %}").unwrap();

        let ctx = TemplateContext::new().with_var("title", "Home");
        let html = Renderer::new(ctx, vec![partials]).render_file(&page).unwrap();

        assert_eq!(html, "<nav>Home</nav><main></main><footer></footer>");
    }

    #[test]
    fn test_missing_include() {
        let err = renderer()
            .render_str("page.html", "{% include \"_nope.html\" %}", None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(name) if name == "_nope.html"));
    }

    #[test]
    fn test_include_depth_error_names_limit() {
        let err = TemplateError::IncludeDepth("_a.html".to_string());
        assert_eq!(err.to_string(), "include depth exceeded 16 at _a.html");
    }

    #[test]
    fn test_include_cycle_detected() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("_a.html");
        fs::write(&a, "{% include \"_b.html\" %}").unwrap();
        fs::write(dir.path().join("_b.html"), "{% include \"_a.html\" %}").unwrap();

        let err = renderer().render_file(&a).unwrap_err();
        assert!(matches!(err, TemplateError::IncludeDepth(_)));
    }

    #[test]
    fn test_inject_before_body() {
        assert_eq!(
            inject_before_body("<body><p>x</p></body></html>", "<script></script>"),
            "<body><p>x</p><script></script></body></html>"
        );
        assert_eq!(inject_before_body("<p>x</p>", "<s/>"), "<p>x</p><s/>");
    }

    #[test]
    fn test_transform_skips_partials_and_other_extensions() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("blog")).unwrap();
        fs::write(src.join("index.html"), "<body>{% include \"_head.html\" %}</body>").unwrap();
        fs::write(src.join("_head.html"), "<h1>{{ mode }}</h1>").unwrap();
        fs::write(src.join("blog/post.html"), "<body>post</body>").unwrap();
        fs::write(src.join("notes.txt"), "not markup").unwrap();

        let sources = SourceSet::resolve(dir.path(), &["src/**/*".to_string()]).unwrap();
        let ctx = TemplateContext::new().with_var("mode", "develop");
        let transform = TemplateTransform::new(Renderer::new(ctx, vec![src.clone()]), "html")
            .with_injection("<script id=\"lr\"></script>");
        let out = dir.path().join("dist");

        let report = transform.apply(&sources, &out).unwrap();

        assert_eq!(report.outputs, 2);
        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            "<body><h1>develop</h1><script id=\"lr\"></script></body>"
        );
        assert!(out.join("blog/post.html").exists());
        assert!(!out.join("_head.html").exists());
        assert!(!out.join("notes.txt").exists());
    }

    #[test]
    fn test_transform_writes_nothing_when_any_template_fails() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.html"), "<p>fine</p>").unwrap();
        fs::write(src.join("b.html"), "<p>{{ broken</p>").unwrap();

        let sources = SourceSet::resolve(dir.path(), &["src/*.html".to_string()]).unwrap();
        let out = dir.path().join("dist");
        let err = TemplateTransform::new(renderer(), "html")
            .apply(&sources, &out)
            .unwrap_err();

        assert!(err.is_transform());
        assert!(!out.join("a.html").exists());
    }
}

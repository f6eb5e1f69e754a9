//! Check command - validate configuration and source globs

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use sitepipe_core::BuildMode;
use sitepipe_pipeline::SourceSet;

use crate::context::BuildContext;

/// Validation result.
#[derive(Debug, Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Run the check command.
///
/// Loads and validates the configuration, then resolves every stage's
/// source globs. Globs matching nothing are warnings; anything else that
/// fails is an error.
pub fn run(config_path: &Path) -> Result<()> {
    tracing::info!(?config_path, "Checking configuration");

    let mut result = ValidationResult::default();

    println!("Checking configuration...");
    let ctx = match BuildContext::load(config_path, BuildMode::Develop) {
        Ok(ctx) => {
            println!("  ✓ Configuration valid");
            Some(ctx)
        }
        Err(e) => {
            result.add_error(format!("Configuration error: {e:#}"));
            println!("  ✗ Configuration invalid: {e:#}");
            None
        }
    };

    if let Some(ctx) = &ctx {
        println!("\nChecking sources...");
        check_sources(ctx, &mut result);
    }

    // Print summary
    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if !result.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

/// Resolve each stage's globs and the purge content globs.
fn check_sources(ctx: &BuildContext, result: &mut ValidationResult) {
    let root = ctx.layout().root();

    for stage in ctx.pipeline().stages() {
        for pattern in stage.sources() {
            match SourceSet::resolve(root, std::slice::from_ref(pattern)) {
                Ok(set) if set.is_empty() => {
                    result.add_warning(format!("{}: `{pattern}` matches no files", stage.name()));
                }
                Ok(set) => println!("  ✓ {:<10} {pattern} ({} files)", stage.name(), set.len()),
                Err(e) => result.add_error(format!("{}: {e}", stage.name())),
            }
        }
    }

    let purge = &ctx.config().styles.purge_content;
    match SourceSet::resolve(root, purge) {
        Ok(set) if set.is_empty() => {
            result.add_warning("styles.purge_content matches no files; produce would purge every class");
        }
        Ok(_) => {}
        Err(e) => result.add_error(format!("styles.purge_content: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_empty_project_passes_with_warnings() {
        let dir = TempDir::new().unwrap();
        let ctx = BuildContext::load(&dir.path().join("sitepipe.toml"), BuildMode::Develop).unwrap();
        let mut result = ValidationResult::default();

        check_sources(&ctx, &mut result);

        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.starts_with("styles:")));
        assert!(result.warnings.iter().any(|w| w.contains("purge_content")));
    }

    #[test]
    fn test_matched_globs_are_not_warnings() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/js")).unwrap();
        fs::write(dir.path().join("src/js/app.js"), "").unwrap();
        let ctx = BuildContext::load(&dir.path().join("sitepipe.toml"), BuildMode::Develop).unwrap();
        let mut result = ValidationResult::default();

        check_sources(&ctx, &mut result);

        assert!(!result.warnings.iter().any(|w| w.contains("src/js/**/*.js")));
        assert!(result.warnings.iter().any(|w| w.contains("src/js/vendor/**/*.js")));
    }

    #[test]
    fn test_invalid_config_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitepipe.toml"), "[server]\nport = 0\n").unwrap();

        assert!(run(&dir.path().join("sitepipe.toml")).is_err());
    }
}

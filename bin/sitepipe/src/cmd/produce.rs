//! Produce command - release build

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use sitepipe_core::BuildMode;

use super::print_report;
use crate::context::BuildContext;

/// Run the produce command.
///
/// Cleans the release directory and builds every stage with purging,
/// minification and image compression. Any failure is fatal.
pub async fn run(config_path: &Path) -> Result<()> {
    let start = Instant::now();
    tracing::info!(?config_path, "Starting release build");

    let ctx = BuildContext::load(config_path, BuildMode::Produce)?;
    let report = ctx.pipeline().run().await.wrap_err("Production build failed")?;

    print_report(&report);
    println!(
        "  Production build complete. Files located in \"{}\".",
        ctx.config().build.release_dir.display()
    );
    println!("  Duration:   {:.2}s", start.elapsed().as_secs_f64());
    println!();

    tracing::info!(duration_ms = start.elapsed().as_millis() as u64, "Release build completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_produce_writes_release_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/js")).unwrap();
        fs::write(dir.path().join("src/js/app.js"), "let unusedName = 1;\n").unwrap();
        fs::write(dir.path().join("src/index.html"), "<body>{{ mode }}</body>").unwrap();

        run(&dir.path().join("sitepipe.toml")).await.unwrap();

        let html = fs::read_to_string(dir.path().join("build/index.html")).unwrap();
        assert_eq!(html, "<body>produce</body>");
        assert!(dir.path().join("build/js/scripts.js").exists());
        assert!(!dir.path().join("dist").exists());
    }

    #[tokio::test]
    async fn test_produce_fails_on_broken_template() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.html"), "<body>{{ nope }}</body>").unwrap();

        let err = run(&dir.path().join("sitepipe.toml")).await.unwrap_err();
        assert!(format!("{err:?}").contains("missing required variable: nope"));
    }
}

//! Develop command - preview server with live reload

use std::{path::Path, sync::Arc};

use color_eyre::eyre::{Result, WrapErr};
use sitepipe_core::BuildMode;

use super::print_report;
use crate::{
    context::BuildContext,
    server::{self, Reloader},
    watcher::{FileWatcher, WatchBinding},
};

/// Run the develop command.
///
/// Cleans and builds the develop tree, then serves it and rebuilds the
/// owning stage whenever a source changes. Runs until interrupted.
pub async fn run(config_path: &Path, open_browser: bool) -> Result<()> {
    tracing::info!(?config_path, "Starting develop mode");

    let ctx = BuildContext::load(config_path, BuildMode::Develop)?;

    // Initial build
    tracing::info!("Running initial build...");
    let report = ctx.pipeline().run().await.wrap_err("Initial build failed")?;
    print_report(&report);
    if !report.is_clean() {
        println!("  Some stages failed; fix the sources and save to rebuild.");
        println!();
    }

    // Bind before watching so a taken port fails fast.
    let addr = ctx.config().server_addr();
    let listener = server::bind(&addr).await?;

    let bindings = WatchBinding::for_pipeline(ctx.pipeline())?;
    let preview = ctx.preview();
    let watcher = FileWatcher::start(
        ctx.layout().root(),
        bindings,
        ctx.debounce(),
        Arc::clone(&preview) as Arc<dyn Reloader>,
    )?;

    println!("  Dev server running at http://{addr}");
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        let _ = open::that(format!("http://{addr}"));
    }

    // Keep watcher alive
    let _watcher = watcher;

    server::serve(listener, ctx.layout().output_dir(), preview).await
}

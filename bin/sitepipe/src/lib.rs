//! sitepipe CLI Library
//!
//! Orchestration for the sitepipe asset pipeline. The binary entry point
//! parses arguments and hands off to the commands here.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (develop, produce, check)
//! - [`context`] - Configuration, layout and pipeline built once at startup
//! - [`server`] - Preview server with live reload
//! - [`watcher`] - File watcher that reruns stages on change
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sitepipe::cmd;
//!
//! # async fn release() -> color_eyre::eyre::Result<()> {
//! cmd::produce::run(Path::new("sitepipe.toml")).await?;
//! # Ok(())
//! # }
//! ```

pub mod cmd;
pub mod context;
pub mod server;
pub mod watcher;

// Re-export core types for convenience
pub use sitepipe_core::{BuildMode, Config, Layout};
pub use sitepipe_pipeline::{Pipeline, RunReport};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
///
/// # Example
///
/// ```no_run
/// sitepipe::init_tracing(2); // Enable DEBUG level logging
/// ```
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

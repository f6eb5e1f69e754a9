//! sitepipe CLI
//!
//! Static-site asset pipeline with a live-reload preview server.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for sitepipe.
#[derive(Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Build, preview and release a static site's assets"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = sitepipe_core::config::DEFAULT_CONFIG_FILE)]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the develop tree, serve it and rebuild on change (default)
    Develop {
        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },
    /// Build the release tree with purging, minification and compression
    Produce,
    /// Validate configuration and source globs
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    sitepipe::init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Develop { open: false }) {
        Commands::Develop { open } => {
            sitepipe::cmd::develop::run(&cli.config, open).await?;
        }
        Commands::Produce => {
            sitepipe::cmd::produce::run(&cli.config).await?;
        }
        Commands::Check => {
            sitepipe::cmd::check::run(&cli.config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_cli_defaults_to_develop() {
        let cli = Cli::parse_from(["sitepipe"]);

        assert_eq!(cli.config, std::path::PathBuf::from("sitepipe.toml"));
        assert_eq!(cli.verbose, 0);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_develop_with_open() {
        let cli = Cli::parse_from(["sitepipe", "develop", "--open"]);

        match cli.command {
            Some(Commands::Develop { open }) => assert!(open),
            _ => panic!("Expected Develop command"),
        }
    }

    #[test]
    fn test_cli_produce_command_parsing() {
        let cli = Cli::parse_from(["sitepipe", "produce"]);
        assert!(matches!(cli.command, Some(Commands::Produce)));
    }

    #[test]
    fn test_cli_check_command_parsing() {
        let cli = Cli::parse_from(["sitepipe", "check"]);
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_cli_verbosity_flags() {
        let cli = Cli::parse_from(["sitepipe", "-vvv", "produce"]);
        assert_eq!(cli.verbose, 3);

        let cli = Cli::parse_from(["sitepipe", "produce", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_custom_config_path() {
        let cli = Cli::parse_from(["sitepipe", "--config", "site/sitepipe.toml", "produce"]);
        assert_eq!(cli.config, std::path::PathBuf::from("site/sitepipe.toml"));
    }
}

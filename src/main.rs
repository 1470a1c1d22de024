//! shellcache - offline asset cache for web application shells
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shellcache::cli::{Cli, Commands};
use shellcache::config::ConfigManager;
use shellcache::error::{ShellCacheError, ShellCacheResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if e.is_retryable() {
                eprintln!("{} retrying may succeed", style("Note:").dim());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ShellCacheResult<()> {
    let cli = Cli::parse();

    // Manifest generation needs no configuration
    if let Commands::Manifest(args) = cli.command {
        init_logging(cli.verbose, false);
        return shellcache::cli::commands::manifest(args).await;
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| ShellCacheError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;
    init_logging(cli.verbose, config.general.log_format == "json");
    if let Some(ref path) = local_config_path {
        debug!("Merged local config: {}", path.display());
    }

    match cli.command {
        Commands::Manifest(_) => unreachable!("Manifest handled above"),
        Commands::Install => shellcache::cli::commands::install(&config).await,
        Commands::Activate => shellcache::cli::commands::activate(&config).await,
        Commands::Fetch(args) => shellcache::cli::commands::fetch(args, &config).await,
        Commands::Message(args) => shellcache::cli::commands::message(args, &config).await,
        Commands::Status(args) => shellcache::cli::commands::status(args, &config).await,
        Commands::Config(args) => {
            shellcache::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("shellcache=warn"),
        1 => EnvFilter::new("shellcache=info"),
        _ => EnvFilter::new("shellcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// shellcache - offline asset cache for web application shells
///
/// Installs, reconciles and serves a versioned cache of an application's
/// build output, driven by a resource manifest.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .shellcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a resource manifest from a build directory
    Manifest(ManifestArgs),

    /// Stage the shell resources for the configured manifest
    Install,

    /// Reconcile cached content against the manifest
    Activate,

    /// Route a request through the worker
    Fetch(FetchArgs),

    /// Deliver a message to the worker
    Message(MessageArgs),

    /// Show worker state and cache contents
    Status(StatusArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the manifest command
#[derive(Parser, Debug)]
pub struct ManifestArgs {
    /// Build output directory
    pub build_dir: PathBuf,

    /// Write the manifest to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Additional build-relative paths to leave out (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute request URL
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the response body to a file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// Message data (skipWaiting or downloadOffline; anything else is ignored)
    pub data: String,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the status command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

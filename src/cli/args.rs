//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// urlcache - Multi-process URL fetch cache
///
/// Fetches each URL at most once into a shared cache directory, no matter
/// how many processes ask for it at the same time.
#[derive(Parser, Debug)]
#[command(name = "urlcache")]
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
    #[arg(short, long, global = true, env = "URLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides cache.dir from config)
    #[arg(short, long, global = true, env = "URLCACHE_DIR")]
    pub dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the cache directory
    Init,

    /// Print the content of a URL, fetching it if not cached yet
    Get(GetArgs),

    /// List cached URLs and the state of their slots
    List(ListArgs),

    /// Show the cache state of a single URL
    Status(StatusArgs),

    /// Discard every cached URL
    Clear(ClearArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// URL to fetch (http, https or file)
    pub url: String,

    /// Write content to a file instead of stdout
    #[arg(short, long, conflicts_with = "path")]
    pub output: Option<PathBuf>,

    /// Print the path of the cached file instead of its content
    #[arg(long)]
    pub path: bool,

    /// Give up waiting on another process after N seconds (0 = never)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// URL to inspect
    pub url: String,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
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

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one URL per line)
    Plain,
}

//! urlcache - Multi-process URL fetch cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use urlcache::cli::{Cli, Commands};
use urlcache::config::{Config, ConfigManager};
use urlcache::error::UrlCacheResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn, 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("urlcache=warn"),
        1 => EnvFilter::new("urlcache=info"),
        _ => EnvFilter::new("urlcache=debug"),
    };

    // Logs go to stderr: stdout carries fetched content
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder
            .with_ansi(std::io::stderr().is_terminal())
            .without_time()
            .init();
    }
}

async fn run() -> UrlCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    if let Some(dir) = cli.dir {
        debug!("Cache directory overridden: {}", dir.display());
        config.cache.dir = Some(dir);
    }

    match cli.command {
        Commands::Init => urlcache::cli::commands::init(&config).await,
        Commands::Get(args) => urlcache::cli::commands::get(args, &config).await,
        Commands::List(args) => urlcache::cli::commands::list(args, &config).await,
        Commands::Status(args) => urlcache::cli::commands::status(args, &config).await,
        Commands::Clear(args) => urlcache::cli::commands::clear(args, &config).await,
        Commands::Config(args) => {
            urlcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

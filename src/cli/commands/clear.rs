//! Clear command - discard the whole cache

use crate::cache;
use crate::cli::args::ClearArgs;
use crate::config::{Config, ConfigManager};
use crate::error::UrlCacheResult;
use console::style;
use std::io::{self, Write};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> UrlCacheResult<()> {
    let dir = ConfigManager::cache_dir(config);

    if !args.yes {
        print!(
            "This will discard every cached URL in {}. Are you sure? [y/N] ",
            dir.display()
        );
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = cache::discard(&dir)?;
    println!(
        "{} cleared {} cached file(s) from {}",
        style("✓").green(),
        removed,
        dir.display()
    );

    Ok(())
}

//! List command - show every cached URL with its slot state

use crate::cache::{SlotEntry, SlotState, UrlCache};
use super::status::styled_state;
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::UrlCacheResult;
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> UrlCacheResult<()> {
    let cache = UrlCache::from_config(config)?;
    let entries = cache.entries()?;

    if entries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cached URLs in {}", cache.dir().display()),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[SlotEntry]) {
    println!(
        "{:<8} {:<12} {}",
        style("SLOT").bold(),
        style("STATE").bold(),
        style("URL").bold()
    );
    println!("{}", "-".repeat(72));

    let mut abandoned = 0;
    for entry in entries {
        if entry.state == SlotState::Abandoned {
            abandoned += 1;
        }
        // Pad before styling so escape codes don't skew the columns
        println!(
            "{:<8} {} {}",
            entry.slot,
            pad(styled_state(&entry.state), entry.state.label().len(), 12),
            entry.url
        );
    }

    println!();
    println!("Total: {} URL(s)", entries.len());
    if abandoned > 0 {
        println!(
            "{} {} abandoned slot(s); run `urlcache clear` to rebuild the cache",
            style("!").yellow(),
            abandoned
        );
    }
}

fn pad(styled: console::StyledObject<&str>, width: usize, column: usize) -> String {
    format!("{}{}", styled, " ".repeat(column.saturating_sub(width)))
}

fn print_plain(entries: &[SlotEntry]) {
    for entry in entries {
        println!("{}", entry.url);
    }
}

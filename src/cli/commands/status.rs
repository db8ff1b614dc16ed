//! Status command - cache state of a single URL

use crate::cache::{SlotState, UrlCache};
use crate::cli::args::StatusArgs;
use crate::config::Config;
use crate::error::UrlCacheResult;
use console::{style, StyledObject};

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> UrlCacheResult<()> {
    let cache = UrlCache::from_config(config)?;
    let state = cache.state(&args.url)?;

    let detail = match &state {
        SlotState::Published { path } => path.display().to_string(),
        SlotState::Fetching => "(another process holds the slot)".to_string(),
        SlotState::Abandoned => "(fetch failed or was interrupted)".to_string(),
        SlotState::Unallocated => "(never requested)".to_string(),
    };
    println!("{} {}", styled_state(&state), detail);

    if state == SlotState::Abandoned {
        println!(
            "{} Run `urlcache clear` to discard and rebuild the cache",
            style("Hint:").yellow()
        );
    }

    Ok(())
}

/// State label colored by severity
pub(crate) fn styled_state(state: &SlotState) -> StyledObject<&'static str> {
    let label = style(state.label());
    match state {
        SlotState::Published { .. } => label.green(),
        SlotState::Fetching => label.yellow(),
        SlotState::Abandoned => label.red(),
        SlotState::Unallocated => label.dim(),
    }
}

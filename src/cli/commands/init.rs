//! Init command - create the cache directory

use crate::config::{Config, ConfigManager};
use crate::error::{UrlCacheError, UrlCacheResult};
use console::style;
use tokio::fs;
use tracing::debug;

/// Execute the init command
pub async fn execute(config: &Config) -> UrlCacheResult<()> {
    let dir = ConfigManager::cache_dir(config);

    if dir.is_dir() {
        println!(
            "{} Cache directory already exists: {}",
            style("•").cyan(),
            dir.display()
        );
        return Ok(());
    }

    fs::create_dir_all(&dir)
        .await
        .map_err(|e| UrlCacheError::io(format!("creating directory {}", dir.display()), e))?;
    debug!("Created {}", dir.display());

    println!(
        "{} Created cache directory {}",
        style("✓").green(),
        dir.display()
    );
    Ok(())
}

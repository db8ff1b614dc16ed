//! Configuration management for urlcache

pub mod schema;

pub use schema::Config;

use crate::error::{UrlCacheError, UrlCacheResult};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Locates, reads and writes the TOML config file
///
/// Several cache processes may read the file while `config init` rewrites
/// it, so saves replace it atomically.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// `<config dir>/urlcache/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("urlcache")
            .join("config.toml")
    }

    /// `<cache dir>/urlcache`
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("urlcache")
    }

    /// Cache directory from config, falling back to the default
    ///
    /// A leading `~` in the configured path is the home directory.
    pub fn cache_dir(config: &Config) -> PathBuf {
        match &config.cache.dir {
            Some(dir) => expand_home(dir),
            None => Self::default_cache_dir(),
        }
    }

    /// Load the config file, or defaults when there is none
    pub async fn load(&self) -> UrlCacheResult<Config> {
        let path = &self.config_path;
        match fs::read_to_string(path).await {
            Ok(content) => parse(path, &content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Config::default())
            }
            Err(e) => Err(UrlCacheError::io(
                format!("reading config from {}", path.display()),
                e,
            )),
        }
    }

    /// Write `config`, replacing the file in one step
    pub async fn save(&self, config: &Config) -> UrlCacheResult<()> {
        let path = &self.config_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| UrlCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let staged = path.with_extension("toml.tmp");
        let content = toml::to_string_pretty(config)?;
        fs::write(&staged, content)
            .await
            .map_err(|e| UrlCacheError::io(format!("writing {}", staged.display()), e))?;
        fs::rename(&staged, path).await.map_err(|e| {
            UrlCacheError::io(format!("replacing config at {}", path.display()), e)
        })?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn parse(path: &Path, content: &str) -> UrlCacheResult<Config> {
    toml::from_str(content).map_err(|e| UrlCacheError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

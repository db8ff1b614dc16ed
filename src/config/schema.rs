//! Configuration schema for urlcache
//!
//! Configuration is stored at `~/.config/urlcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache directory settings
    pub cache: CacheConfig,

    /// Waiting on another process's fetch
    pub wait: WaitConfig,

    /// Network transport settings
    pub fetch: FetchConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Shared cache directory (defaults to the platform cache dir)
    pub dir: Option<PathBuf>,
}

/// Bounded wait on an in-progress fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Give up after N seconds (0 = wait indefinitely)
    pub timeout_secs: u64,

    /// How often the pending marker lock is retried
    pub poll_interval_ms: u64,

    /// How often a "still waiting" message is logged
    pub progress_interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            poll_interval_ms: 100,
            progress_interval_secs: 10,
        }
    }
}

impl WaitConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }
}

/// Network transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds (0 = none)
    pub timeout_secs: u64,

    /// User-Agent header sent with HTTP requests
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: format!("urlcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

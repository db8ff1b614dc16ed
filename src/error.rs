//! Error types for urlcache
//!
//! All modules use `UrlCacheResult<T>` as their return type.

use crate::fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for urlcache operations
pub type UrlCacheResult<T> = Result<T, UrlCacheError>;

/// All errors that can occur in urlcache
#[derive(Error, Debug)]
pub enum UrlCacheError {
    // Cache errors
    #[error("Cache directory not found: {0}")]
    CacheDirNotFound(PathBuf),

    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error(
        "Corrupted cache state for url '{url}' (slot {slot}): the fetch never completed. \
         Discard the entire cache and rebuild it"
    )]
    CorruptedState { url: String, slot: u64 },

    #[error("Timed out after {waited_secs}s waiting for {url} (slot {slot}) to be fetched")]
    WaitTimeout {
        url: String,
        slot: u64,
        waited_secs: u64,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UrlCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Fetch failures are not: the slot stays allocated and the next
    /// attempt reports corrupted state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheDirNotFound(_) => Some("Run: urlcache init"),
            Self::CorruptedState { .. } => Some("Run: urlcache clear --yes"),
            Self::Fetch { .. } => {
                Some("The slot for this URL is now unusable; run `urlcache clear --yes` before retrying")
            }
            Self::WaitTimeout { .. } => {
                Some("Another process is still fetching; retry later or raise wait.timeout_secs")
            }
            _ => None,
        }
    }
}

//! urlcache - Multi-process URL fetch cache
//!
//! Maps URLs to fetched content in a shared directory. Any number of
//! processes can use the same directory: each URL is fetched at most once
//! and partially written content is never visible.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use urlcache::{DefaultFetcher, UrlCache};
//!
//! let config = urlcache::config::Config::default();
//! let cache = UrlCache::open(
//!     "/var/cache/urlcache",
//!     Arc::new(DefaultFetcher::new(&config.fetch)),
//!     config.wait.clone(),
//! )?;
//! let bytes = cache.get("https://example.org/data.json")?.into_bytes()?;
//! ```

#[cfg(not(unix))]
compile_error!("urlcache relies on flock(2) and only supports Unix platforms");

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;

pub use cache::{discard, Content, SlotEntry, SlotId, SlotState, UrlCache};
pub use error::{UrlCacheError, UrlCacheResult};
pub use fetch::{DefaultFetcher, Fetch, FetchError, HttpFetcher};

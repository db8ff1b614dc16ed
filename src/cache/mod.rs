//! Persistent URL cache shared between processes
//!
//! Maps URLs to fetched content through a single directory. Processes
//! coordinate only through advisory locks on files in that directory:
//! at most one of them fetches a given URL, and nobody ever reads a
//! half-written result.
//!
//! # Layout
//!
//! | File | Description |
//! |------|-------------|
//! | `index` | One URL per line; line N is slot N. Append-only |
//! | `N` | Final data of slot N, read-only once it exists |
//! | `N-fetching` | Pending marker, exclusively locked by the fetcher |
//!
//! # Slot States
//!
//! | State | Index entry | Data file | Marker |
//! |-------|-------------|-----------|--------|
//! | Unallocated | no | no | no |
//! | Fetching | yes | no | locked |
//! | Abandoned | yes | no | absent or unlocked |
//! | Published | yes | yes | absent |
//!
//! An abandoned slot is never re-fetched: slot numbers are positional, so
//! the whole directory has to be discarded (see [`discard`]).

pub mod content;
pub mod index;
pub mod lock;
pub mod publish;
pub mod slot;
pub mod wait;

pub use content::Content;
pub use index::{normalize_url, IndexStore, Resolution, INDEX_FILE};
pub use lock::{LockMode, LockedFile};
pub use publish::Lease;
pub use slot::{SlotId, SlotPaths, SlotState};

use crate::config::schema::WaitConfig;
use crate::config::{Config, ConfigManager};
use crate::error::{UrlCacheError, UrlCacheResult};
use crate::fetch::{DefaultFetcher, Fetch};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One index entry and the state of its slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    pub slot: SlotId,
    pub url: String,
    #[serde(flatten)]
    pub state: SlotState,
}

struct Inner {
    dir: PathBuf,
    index: IndexStore,
    fetcher: Arc<dyn Fetch>,
    wait: WaitConfig,
}

/// Handle on a cache directory
///
/// Cheap to clone; clones share the directory handle and fetcher.
#[derive(Clone)]
pub struct UrlCache {
    inner: Arc<Inner>,
}

impl UrlCache {
    /// Open an existing cache directory
    pub fn open(
        dir: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetch>,
        wait: WaitConfig,
    ) -> UrlCacheResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(UrlCacheError::CacheDirNotFound(dir));
        }

        debug!("Opened cache at {}", dir.display());
        Ok(Self {
            inner: Arc::new(Inner {
                index: IndexStore::new(&dir),
                dir,
                fetcher,
                wait,
            }),
        })
    }

    /// Open the configured cache directory with the default transport
    pub fn from_config(config: &Config) -> UrlCacheResult<Self> {
        Self::open(
            ConfigManager::cache_dir(config),
            Arc::new(DefaultFetcher::new(&config.fetch)),
            config.wait.clone(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Content for `url`, fetching it if no process has yet
    ///
    /// Blocks while another process is fetching the same URL.
    pub fn get(&self, url: &str) -> UrlCacheResult<Content> {
        let url = normalize_url(url)?;
        let inner = &self.inner;

        let resolution = inner.index.resolve_or_allocate(url)?;
        let slot = resolution.slot();
        let paths = SlotPaths::new(&inner.dir, slot);

        match resolution {
            Resolution::Allocated { index_lock, .. } => {
                let lease = Lease::claim(slot, paths).map_err(|e| {
                    UrlCacheError::io(format!("creating pending marker for slot {}", slot), e)
                })?;
                drop(index_lock);

                publish::fetch_and_publish(lease, url, inner.fetcher.as_ref())
            }
            Resolution::Existing(_) => wait::await_slot(slot, &paths, url, &inner.wait),
        }
    }

    /// [`get`](Self::get) on tokio's blocking pool
    pub async fn get_async(&self, url: impl Into<String>) -> UrlCacheResult<Content> {
        let cache = self.clone();
        let url = url.into();
        tokio::task::spawn_blocking(move || cache.get(&url))
            .await
            .map_err(|e| UrlCacheError::Internal(format!("cache lookup task failed: {}", e)))?
    }

    /// Current state of `url`'s slot, without allocating or waiting
    pub fn state(&self, url: &str) -> UrlCacheResult<SlotState> {
        let url = normalize_url(url)?;
        match self.inner.index.lookup(url)? {
            None => Ok(SlotState::Unallocated),
            Some(slot) => self.probe(slot),
        }
    }

    /// Every index entry with its slot state, in slot order
    pub fn entries(&self) -> UrlCacheResult<Vec<SlotEntry>> {
        self.inner
            .index
            .entries()?
            .into_iter()
            .map(|(slot, url)| {
                Ok(SlotEntry {
                    slot,
                    state: self.probe(slot)?,
                    url,
                })
            })
            .collect()
    }

    fn probe(&self, slot: SlotId) -> UrlCacheResult<SlotState> {
        SlotState::probe(&SlotPaths::new(&self.inner.dir, slot))
            .map_err(|e| UrlCacheError::io(format!("inspecting slot {}", slot), e))
    }
}

/// Discard all cache state in `dir`, leaving the directory itself
///
/// The remedy for an abandoned slot. Holds the index lock while removing so
/// no process allocates into a half-deleted cache, and waits for fetches
/// already in flight. Returns how many slot files were removed.
pub fn discard(dir: &Path) -> UrlCacheResult<usize> {
    if !dir.is_dir() {
        return Err(UrlCacheError::CacheDirNotFound(dir.to_path_buf()));
    }

    let index_store = IndexStore::new(dir);
    let index = index_store.lock()?;

    // In-flight fetches publish into this generation; let them finish first
    for name in slot_file_names(dir)? {
        if name.ends_with(slot::MARKER_SUFFIX) {
            wait_for_fetcher(&dir.join(name))?;
        }
    }

    let mut removed = 0;
    for name in slot_file_names(dir)? {
        let path = dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(UrlCacheError::io(format!("removing {}", path.display()), e)),
        }
    }

    let index_path = index_store.path();
    fs::remove_file(index_path)
        .map_err(|e| UrlCacheError::io(format!("removing {}", index_path.display()), e))?;
    drop(index);

    info!("Discarded cache at {} ({} slot files)", dir.display(), removed);
    Ok(removed)
}

fn slot_file_names(dir: &Path) -> UrlCacheResult<Vec<String>> {
    let entries =
        fs::read_dir(dir).map_err(|e| UrlCacheError::io(format!("reading {}", dir.display()), e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| UrlCacheError::io("reading cache entry", e))?;
        if let Some(name) = entry.file_name().to_str() {
            if slot::is_slot_file_name(name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Block until no process holds `marker` for a fetch
fn wait_for_fetcher(marker: &Path) -> UrlCacheResult<()> {
    let file = match File::open(marker) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(UrlCacheError::io(format!("opening {}", marker.display()), e)),
    };
    debug!("Waiting for fetcher holding {}", marker.display());
    LockedFile::lock(file, LockMode::Exclusive)
        .map(drop)
        .map_err(|e| UrlCacheError::io(format!("locking {}", marker.display()), e))
}

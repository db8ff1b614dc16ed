//! Waiting on slots allocated by someone else
//!
//! A fetcher holds its pending marker under an exclusive lock, so a shared
//! lock on the marker is granted exactly when that fetcher has finished,
//! successfully or not. The final data file decides which.

use super::content::Content;
use super::lock::{LockMode, LockedFile};
use super::slot::{SlotId, SlotPaths};
use crate::config::schema::WaitConfig;
use crate::error::{UrlCacheError, UrlCacheResult};
use std::fs::File;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Serve a slot that was already in the index
pub fn await_slot(
    slot: SlotId,
    paths: &SlotPaths,
    url: &str,
    wait: &WaitConfig,
) -> UrlCacheResult<Content> {
    if paths.is_published() {
        debug!("Slot {} already published", slot);
        return open_published(slot, paths);
    }

    // Held until the data file is open; a discard waits on it
    let _released = match File::open(&paths.marker) {
        Ok(marker) => {
            info!("Waiting for {} (slot {}) to be fetched", url, slot);
            Some(wait_for_release(marker, slot, url, wait)?)
        }
        // Publication finished and the marker is already gone, or the
        // fetcher never got as far as creating it
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(UrlCacheError::io(
                format!("opening {}", paths.marker.display()),
                e,
            ))
        }
    };

    if paths.is_published() {
        return open_published(slot, paths);
    }

    warn!(
        "Slot {} for {} has no data and no live fetcher; the cache must be discarded",
        slot, url
    );
    Err(UrlCacheError::CorruptedState {
        url: url.to_string(),
        slot: slot.get(),
    })
}

/// Block until the fetcher's exclusive lock on `marker` is gone
///
/// Returns the shared lock that proved it.
fn wait_for_release(
    mut marker: File,
    slot: SlotId,
    url: &str,
    wait: &WaitConfig,
) -> UrlCacheResult<LockedFile> {
    let started = Instant::now();
    let timeout = wait.timeout();
    let mut next_report = started + wait.progress_interval();

    loop {
        marker = match LockedFile::try_lock(marker, LockMode::Shared)
            .map_err(|e| UrlCacheError::io(format!("locking marker of slot {}", slot), e))?
        {
            Ok(released) => {
                debug!("Slot {} released after {:?}", slot, started.elapsed());
                return Ok(released);
            }
            Err(marker) => marker,
        };

        let now = Instant::now();
        let waited = now - started;
        if let Some(limit) = timeout {
            if waited >= limit {
                return Err(UrlCacheError::WaitTimeout {
                    url: url.to_string(),
                    slot: slot.get(),
                    waited_secs: waited.as_secs(),
                });
            }
        }
        if now >= next_report {
            info!("Still waiting for {} (slot {}), {}s so far", url, slot, waited.as_secs());
            next_report = now + wait.progress_interval();
        }

        let mut pause = wait.poll_interval();
        if let Some(limit) = timeout {
            pause = pause.min(limit.saturating_sub(waited).max(Duration::from_millis(1)));
        }
        thread::sleep(pause);
    }
}

fn open_published(slot: SlotId, paths: &SlotPaths) -> UrlCacheResult<Content> {
    Content::open(slot, &paths.data)
        .map_err(|e| UrlCacheError::io(format!("opening {}", paths.data.display()), e))
}

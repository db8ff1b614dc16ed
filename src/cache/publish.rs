//! Fetch coordination for newly allocated slots
//!
//! The allocating process owns the slot through a [`Lease`]: the pending
//! marker held under an exclusive lock. Bytes are streamed into the marker
//! and, only once complete, hard-linked to the final data file name, so the
//! final file is never visible half-written. Dropping a lease without
//! publishing releases the lock and removes the marker, which leaves the
//! slot abandoned.

use super::content::Content;
use super::lock::{LockMode, LockedFile};
use super::slot::{SlotId, SlotPaths};
use crate::error::{UrlCacheError, UrlCacheResult};
use crate::fetch::{Fetch, FetchError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use tracing::{debug, info, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Exclusive claim on a pending slot
#[derive(Debug)]
pub struct Lease {
    slot: SlotId,
    paths: SlotPaths,
    lock: Option<LockedFile>,
}

impl Lease {
    /// Create the pending marker and lock it exclusively
    ///
    /// Must be called while the index lock that allocated `slot` is still
    /// held, so no waiter can see the slot before its marker is locked.
    pub fn claim(slot: SlotId, paths: SlotPaths) -> io::Result<Self> {
        let marker = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&paths.marker)?;
        let lock = LockedFile::lock(marker, LockMode::Exclusive)?;
        // Leftovers from a discarded cache generation
        lock.file().set_len(0)?;

        debug!("Claimed {}", paths.marker.display());
        Ok(Self {
            slot,
            paths,
            lock: Some(lock),
        })
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.lock
            .as_mut()
            .map(LockedFile::file_mut)
            .ok_or_else(|| io::Error::other("lease already released"))
    }

    /// Make the marker's contents the slot's final data file
    ///
    /// The returned handle is opened while the marker is still locked, so a
    /// concurrent discard cannot remove the file before it is read.
    fn publish(mut self) -> io::Result<Content> {
        let file = self.file()?;
        file.sync_all()?;
        let mut permissions = file.metadata()?.permissions();
        permissions.set_readonly(true);
        file.set_permissions(permissions)?;

        fs::hard_link(&self.paths.marker, &self.paths.data)?;
        let content = Content::open(self.slot, &self.paths.data)?;

        // Published: wake waiters, then tidy up the marker
        drop(self.lock.take());
        if let Err(e) = fs::remove_file(&self.paths.marker) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.paths.marker.display(), e);
            }
        }

        Ok(content)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            drop(lock);
            debug!("Releasing unpublished slot {}", self.slot);
            if let Err(e) = fs::remove_file(&self.paths.marker) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", self.paths.marker.display(), e);
                }
            }
        }
    }
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

fn copy_stream(source: &mut dyn Read, sink: &mut File) -> Result<u64, CopyError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        sink.write_all(&buf[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }
}

/// Fetch `url` into the leased slot and publish it
///
/// Errors are returned as-is and never retried; the slot then stays
/// allocated without data.
pub fn fetch_and_publish(
    mut lease: Lease,
    url: &str,
    fetcher: &dyn Fetch,
) -> UrlCacheResult<Content> {
    let slot = lease.slot();
    info!("Fetching {} into slot {}", url, slot);

    let mut source = fetcher.fetch(url).map_err(|source| UrlCacheError::Fetch {
        url: url.to_string(),
        source,
    })?;

    let marker = lease.paths.marker.clone();
    let sink = lease
        .file()
        .map_err(|e| UrlCacheError::io(format!("writing {}", marker.display()), e))?;
    let bytes = copy_stream(&mut source, sink).map_err(|e| match e {
        CopyError::Read(e) => UrlCacheError::Fetch {
            url: url.to_string(),
            source: FetchError::Io(e),
        },
        CopyError::Write(e) => UrlCacheError::io(format!("writing {}", marker.display()), e),
    })?;

    let content = lease
        .publish()
        .map_err(|e| UrlCacheError::io(format!("publishing slot {}", slot), e))?;
    info!("Published {} ({} bytes) as slot {}", url, bytes, slot);

    Ok(content)
}

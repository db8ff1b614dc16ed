//! Slot identity, on-disk paths and observable state
//!
//! A slot is allocated by appending its URL to the index; its number is the
//! line position. The data for slot `N` lives in file `N`, which only ever
//! appears through an atomic link from the pending marker `N-fetching`.

use super::lock::{LockMode, LockedFile};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix of the transient file a fetcher holds locked
pub const MARKER_SUFFIX: &str = "-fetching";

/// Dense integer id of a cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotId(u64);

impl SlotId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Files belonging to one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPaths {
    /// Final data file, present once published
    pub data: PathBuf,
    /// Pending marker, present while a fetch is in flight
    pub marker: PathBuf,
}

impl SlotPaths {
    pub fn new(dir: &Path, slot: SlotId) -> Self {
        Self {
            data: dir.join(slot.to_string()),
            marker: dir.join(format!("{}{}", slot, MARKER_SUFFIX)),
        }
    }

    /// Whether the final data file has been published
    pub fn is_published(&self) -> bool {
        self.data.is_file()
    }
}

/// Whether a directory entry name belongs to a slot (`N` or `N-fetching`)
pub fn is_slot_file_name(name: &str) -> bool {
    let digits = name.strip_suffix(MARKER_SUFFIX).unwrap_or(name);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Observable state of a URL's slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum SlotState {
    /// URL has no index entry
    Unallocated,
    /// Allocated and a live process holds the pending marker
    Fetching,
    /// Allocated, unpublished and nobody holds the marker: the fetch failed
    /// or its process died
    Abandoned,
    /// Final data file exists and is immutable
    Published { path: PathBuf },
}

impl SlotState {
    /// Inspect the directory for an allocated slot
    ///
    /// Probes the marker with a non-blocking shared lock, so a live fetch is
    /// never disturbed.
    pub fn probe(paths: &SlotPaths) -> io::Result<Self> {
        if paths.is_published() {
            return Ok(Self::Published {
                path: paths.data.clone(),
            });
        }

        let marker = match File::open(&paths.marker) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::settled(paths));
            }
            Err(e) => return Err(e),
        };

        match LockedFile::try_lock(marker, LockMode::Shared)? {
            Err(_) => Ok(Self::Fetching),
            // Publication may have finished between the two checks
            Ok(_probe) => Ok(Self::settled(paths)),
        }
    }

    fn settled(paths: &SlotPaths) -> Self {
        if paths.is_published() {
            Self::Published {
                path: paths.data.clone(),
            }
        } else {
            Self::Abandoned
        }
    }

    /// Short label used in listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unallocated => "unallocated",
            Self::Fetching => "fetching",
            Self::Abandoned => "abandoned",
            Self::Published { .. } => "published",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

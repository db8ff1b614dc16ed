//! Append-only URL index and slot allocation
//!
//! The index file holds one URL per line; line `i` is slot `i`. Every read
//! and every append happens under an exclusive `flock` on the index, which
//! is the only mutual exclusion the cache relies on. The file is parsed
//! afresh under each lock, so a cache discarded and rebuilt by another
//! process is never confused with the one seen before.

use super::lock::{LockMode, LockedFile};
use super::slot::SlotId;
use crate::error::{UrlCacheError, UrlCacheResult};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the index file inside the cache directory
pub const INDEX_FILE: &str = "index";

/// Outcome of resolving a URL against the index
#[derive(Debug)]
pub enum Resolution {
    /// URL was already in the index; the index lock has been released
    Existing(SlotId),
    /// URL was just appended. The index stays locked until `index_lock` is
    /// dropped, which the caller does once it has claimed the slot's marker.
    Allocated {
        slot: SlotId,
        index_lock: LockedFile,
    },
}

impl Resolution {
    pub fn slot(&self) -> SlotId {
        match self {
            Self::Existing(slot) => *slot,
            Self::Allocated { slot, .. } => *slot,
        }
    }
}

/// Trim a URL and check it can be stored as one index line
pub fn normalize_url(url: &str) -> UrlCacheResult<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(UrlCacheError::invalid_url(url, "empty URL"));
    }
    if url.contains(['\n', '\r']) {
        return Err(UrlCacheError::invalid_url(url, "URL contains a line break"));
    }
    Ok(url)
}

/// Parsed contents of the index file
#[derive(Debug, Default)]
struct Listing {
    urls: Vec<String>,
    by_url: HashMap<String, SlotId>,
    /// Last line has no newline yet; it still counts as a slot
    unterminated: bool,
}

impl Listing {
    fn read(file: &mut File) -> io::Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;

        let mut listing = Self {
            unterminated: raw.last().is_some_and(|&b| b != b'\n'),
            ..Self::default()
        };
        let body = raw.strip_suffix(b"\n").unwrap_or(&raw[..]);
        if !body.is_empty() {
            for line in body.split(|&b| b == b'\n') {
                listing.push(decode_line(line));
            }
        }
        Ok(listing)
    }

    fn push(&mut self, url: String) {
        let slot = SlotId::new(self.urls.len() as u64);
        // Later duplicates win, matching a plain top-to-bottom scan
        self.by_url.insert(url.clone(), slot);
        self.urls.push(url);
    }

    fn lookup(&self, url: &str) -> Option<SlotId> {
        self.by_url.get(url).copied()
    }

    fn next_free(&self) -> SlotId {
        SlotId::new(self.urls.len() as u64)
    }
}

fn decode_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line).trim_end().to_string()
}

/// The index file of one cache directory
#[derive(Debug)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(INDEX_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the slot for `url`, appending it to the index if unseen
    ///
    /// `url` must already be normalized.
    pub fn resolve_or_allocate(&self, url: &str) -> UrlCacheResult<Resolution> {
        let mut index_lock = self.lock()?;
        let listing = self.read(&mut index_lock)?;

        if let Some(slot) = listing.lookup(url) {
            debug!("Index hit: {} -> slot {}", url, slot);
            return Ok(Resolution::Existing(slot));
        }

        let slot = listing.next_free();
        let mut line = String::with_capacity(url.len() + 2);
        if listing.unterminated {
            line.push('\n');
        }
        line.push_str(url);
        line.push('\n');

        index_lock
            .file_mut()
            .write_all(line.as_bytes())
            .map_err(|e| UrlCacheError::io(format!("appending to {}", self.path.display()), e))?;

        debug!("Allocated slot {} for {}", slot, url);
        Ok(Resolution::Allocated { slot, index_lock })
    }

    /// Slot for `url` without allocating
    pub fn lookup(&self, url: &str) -> UrlCacheResult<Option<SlotId>> {
        let mut index_lock = self.lock()?;
        Ok(self.read(&mut index_lock)?.lookup(url))
    }

    /// All URLs in slot order
    pub fn entries(&self) -> UrlCacheResult<Vec<(SlotId, String)>> {
        let mut index_lock = self.lock()?;
        Ok(self
            .read(&mut index_lock)?
            .urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| (SlotId::new(i as u64), url))
            .collect())
    }

    fn read(&self, index_lock: &mut LockedFile) -> UrlCacheResult<Listing> {
        Listing::read(index_lock.file_mut())
            .map_err(|e| UrlCacheError::io(format!("reading {}", self.path.display()), e))
    }

    /// Lock the index file currently linked at `path`
    ///
    /// A discard can unlink the file while we wait for its lock; appending
    /// to that orphan would hand out slots the next cache generation reuses.
    pub(crate) fn lock(&self) -> UrlCacheResult<LockedFile> {
        loop {
            let file = OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(&self.path)
                .map_err(|e| UrlCacheError::io(format!("opening {}", self.path.display()), e))?;

            let locked = LockedFile::lock(file, LockMode::Exclusive)
                .map_err(|e| UrlCacheError::io(format!("locking {}", self.path.display()), e))?;

            if self
                .is_current(locked.file())
                .map_err(|e| UrlCacheError::io(format!("checking {}", self.path.display()), e))?
            {
                return Ok(locked);
            }
            debug!("Index was replaced while waiting for its lock, reopening");
        }
    }

    fn is_current(&self, file: &File) -> io::Result<bool> {
        let held = file.metadata()?;
        if held.nlink() == 0 {
            return Ok(false);
        }
        match fs::metadata(&self.path) {
            Ok(linked) => Ok(linked.dev() == held.dev() && linked.ino() == held.ino()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn allocate(store: &IndexStore, url: &str) -> Resolution {
        store.resolve_or_allocate(url).unwrap()
    }

    #[test]
    fn normalize_trims_and_rejects() {
        assert_eq!(normalize_url("  http://x/a\n").unwrap(), "http://x/a");
        assert!(normalize_url("   ").is_err());
        assert!(normalize_url("http://x/a\nhttp://x/b").is_err());
    }

    #[test]
    fn first_url_gets_slot_zero_and_creates_index() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        let resolution = allocate(&store, "http://x/a");
        assert!(matches!(resolution, Resolution::Allocated { .. }));
        assert_eq!(resolution.slot(), SlotId::new(0));
        drop(resolution);

        assert_eq!(
            fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap(),
            "http://x/a\n"
        );
    }

    #[test]
    fn slots_follow_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        assert_eq!(allocate(&store, "http://x/a").slot(), SlotId::new(0));
        assert_eq!(allocate(&store, "http://x/b").slot(), SlotId::new(1));

        let again = allocate(&store, "http://x/a");
        assert!(matches!(again, Resolution::Existing(_)));
        assert_eq!(again.slot(), SlotId::new(0));

        let entries = store.entries().unwrap();
        assert_eq!(
            entries,
            vec![
                (SlotId::new(0), "http://x/a".to_string()),
                (SlotId::new(1), "http://x/b".to_string()),
            ]
        );
    }

    #[test]
    fn sees_appends_from_other_handles() {
        let dir = TempDir::new().unwrap();
        let first = IndexStore::new(dir.path());
        let second = IndexStore::new(dir.path());

        drop(allocate(&first, "http://x/a"));
        drop(allocate(&second, "http://x/b"));

        let resolution = allocate(&first, "http://x/b");
        assert!(matches!(resolution, Resolution::Existing(_)));
        assert_eq!(resolution.slot(), SlotId::new(1));
        assert_eq!(first.lookup("http://x/c").unwrap(), None);
    }

    #[test]
    fn reads_existing_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "http://x/a\r\nhttp://x/b\n").unwrap();
        let store = IndexStore::new(dir.path());

        assert_eq!(store.lookup("http://x/a").unwrap(), Some(SlotId::new(0)));
        assert_eq!(store.lookup("http://x/b").unwrap(), Some(SlotId::new(1)));
        assert_eq!(allocate(&store, "http://x/c").slot(), SlotId::new(2));
    }

    #[test]
    fn unterminated_last_line_counts_and_gets_terminated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        fs::write(&path, "http://x/a\nhttp://x/b").unwrap();
        let store = IndexStore::new(dir.path());

        assert_eq!(store.lookup("http://x/b").unwrap(), Some(SlotId::new(1)));
        assert_eq!(allocate(&store, "http://x/c").slot(), SlotId::new(2));

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "http://x/a\nhttp://x/b\nhttp://x/c\n"
        );
        assert_eq!(store.lookup("http://x/b").unwrap(), Some(SlotId::new(1)));
        assert_eq!(store.lookup("http://x/c").unwrap(), Some(SlotId::new(2)));
        assert_eq!(store.entries().unwrap().len(), 3);
    }

    #[test]
    fn rereads_index_replaced_by_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        let store = IndexStore::new(dir.path());

        drop(allocate(&store, "http://x/a"));
        drop(allocate(&store, "http://x/b"));

        let replacement = dir.path().join("index.new");
        fs::write(&replacement, "http://x/y\nhttp://x/z\nhttp://x/w\n").unwrap();
        fs::rename(&replacement, &path).unwrap();

        assert_eq!(store.lookup("http://x/a").unwrap(), None);
        assert_eq!(store.lookup("http://x/z").unwrap(), Some(SlotId::new(1)));
    }

    #[test]
    fn rereads_index_recreated_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        let store = IndexStore::new(dir.path());

        drop(allocate(&store, "http://x/a"));

        // Longer than before; the filesystem is free to reuse the inode
        fs::remove_file(&path).unwrap();
        fs::write(&path, "http://x/zzzzzzzzzz\nhttp://x/q\n").unwrap();

        assert_eq!(store.lookup("http://x/a").unwrap(), None);
        assert_eq!(store.lookup("http://x/q").unwrap(), Some(SlotId::new(1)));
        assert_eq!(allocate(&store, "http://x/r").slot(), SlotId::new(2));
    }

    #[test]
    fn waiter_skips_index_unlinked_under_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        fs::write(&path, "http://x/old0\nhttp://x/old1\n").unwrap();

        let held = LockedFile::lock(
            OpenOptions::new().read(true).open(&path).unwrap(),
            LockMode::Exclusive,
        )
        .unwrap();

        let waiter_dir = dir.path().to_path_buf();
        let waiter = std::thread::spawn(move || {
            let store = IndexStore::new(&waiter_dir);
            store.resolve_or_allocate("http://x/b").unwrap().slot()
        });

        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(!waiter.is_finished());
        fs::remove_file(&path).unwrap();
        drop(held);

        assert_eq!(waiter.join().unwrap(), SlotId::new(0));
        assert_eq!(fs::read_to_string(&path).unwrap(), "http://x/b\n");
    }

    #[test]
    fn allocation_holds_index_lock() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        let resolution = allocate(&store, "http://x/a");
        let contender = OpenOptions::new()
            .read(true)
            .open(dir.path().join(INDEX_FILE))
            .unwrap();
        let contender = LockedFile::try_lock(contender, LockMode::Exclusive).unwrap();
        assert!(contender.is_err());

        drop(resolution);
        let contender = OpenOptions::new()
            .read(true)
            .open(dir.path().join(INDEX_FILE))
            .unwrap();
        assert!(LockedFile::try_lock(contender, LockMode::Exclusive)
            .unwrap()
            .is_ok());
    }

    #[test]
    fn line_count_never_decreases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        let store = IndexStore::new(dir.path());

        let mut last = 0;
        for url in ["http://x/a", "http://x/b", "http://x/a", "http://x/c", "http://x/b"] {
            drop(allocate(&store, url));
            let lines = fs::read_to_string(&path).unwrap().lines().count();
            assert!(lines >= last);
            last = lines;
        }
        assert_eq!(last, 3);
    }
}

//! Read handle over a published slot

use super::slot::SlotId;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Published content of one URL
///
/// Wraps the open final data file. The file never changes once published,
/// so the handle can be read at leisure.
#[derive(Debug)]
pub struct Content {
    slot: SlotId,
    path: PathBuf,
    file: File,
}

impl Content {
    pub(crate) fn open(slot: SlotId, path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            slot,
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Path of the final data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the remaining bytes into memory
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

impl Read for Content {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

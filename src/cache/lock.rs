//! Scoped advisory file locks
//!
//! Thin wrapper over `flock(2)` through `fs4`. A lock belongs to the open file
//! description, so two handles opened separately conflict even inside one
//! process; this is what lets threads and processes share the same
//! discipline. The lock is released when the guard is dropped, on every
//! exit path.

use fs4::FileExt;
use std::fmt;
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Kind of advisory lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders at once, excluded by any exclusive holder
    Shared,
    /// Single holder
    Exclusive,
}

impl LockMode {
    fn acquire(self, file: &File) -> io::Result<()> {
        // Fully qualified: newer std has inherent `File` lock methods
        match self {
            Self::Shared => FileExt::lock_shared(file),
            Self::Exclusive => FileExt::lock_exclusive(file),
        }
    }

    fn try_acquire(self, file: &File) -> io::Result<()> {
        match self {
            Self::Shared => FileExt::try_lock_shared(file),
            Self::Exclusive => FileExt::try_lock_exclusive(file),
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// An open file holding an advisory lock until dropped
pub struct LockedFile {
    file: File,
    mode: LockMode,
}

impl LockedFile {
    /// Block until `mode` is granted on `file`
    pub fn lock(file: File, mode: LockMode) -> io::Result<Self> {
        loop {
            match mode.acquire(&file) {
                Ok(()) => return Ok(Self { file, mode }),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Try to take the lock without blocking
    ///
    /// Hands the file back in `Err` when another holder conflicts.
    pub fn try_lock(file: File, mode: LockMode) -> io::Result<Result<Self, File>> {
        match mode.try_acquire(&file) {
            Ok(()) => Ok(Ok(Self { file, mode })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Err(file)),
            Err(e) => Err(e),
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl fmt::Debug for LockedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedFile")
            .field("fd", &self.file.as_raw_fd())
            .field("mode", &self.mode)
            .finish()
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        // Closing the descriptor would release it as well
        let _ = FileExt::unlock(&self.file);
    }
}

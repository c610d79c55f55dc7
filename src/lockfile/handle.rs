//! Open lock file handle with advisory lock operations.

use crate::error::{LockrunError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock mode requested on the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// One holder at a time.
    #[default]
    Exclusive,
    /// Many holders at a time, excluding any exclusive holder.
    Shared,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Exclusive => "exclusive",
            LockMode::Shared => "shared",
        }
    }
}

/// Outcome of a non-blocking lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLock {
    Locked,
    WouldBlock,
}

/// Device and inode number of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
}

impl FileIdentity {
    fn of(meta: &fs::Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

/// An open lock file.
///
/// Dropping the handle closes the descriptor, which releases any lock held
/// through it.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: File,
}

impl LockFile {
    /// Open the lock file, creating it if `create` is set.
    ///
    /// Opening never blocks on locks held by others.
    ///
    /// # Returns
    ///
    /// * `Ok(LockFile)` - The open handle
    /// * `Err(LockrunError::LockFileMissing)` - `create` is false and the path does not exist
    /// * `Err(LockrunError::CannotOpen)` - Any other open failure
    pub fn open(path: &Path, create: bool) -> Result<Self> {
        Self::open_with(path, create, false)
    }

    /// Like [`LockFile::open`], but falls back to a read-only handle when
    /// read-write access is denied. Locking works on read-only handles; the
    /// signature can then only be checked, not written.
    pub fn open_allow_read_only(path: &Path, create: bool) -> Result<Self> {
        Self::open_with(path, create, true)
    }

    fn open_with(path: &Path, create: bool, allow_read_only: bool) -> Result<Self> {
        let opened = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(path);

        let file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && allow_read_only => {
                debug!(path = %path.display(), "read-write open denied, retrying read-only");
                File::open(path).map_err(|e| open_error(path, create, e))?
            }
            Err(e) => return Err(open_error(path, create, e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Get the path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attempt to lock without blocking.
    pub fn try_lock(&self, mode: LockMode) -> Result<TryLock> {
        let attempt = match mode {
            LockMode::Exclusive => FileExt::try_lock_exclusive(&self.file),
            LockMode::Shared => FileExt::try_lock_shared(&self.file),
        };
        match attempt {
            Ok(()) => Ok(TryLock::Locked),
            Err(e) if is_contended(&e) => Ok(TryLock::WouldBlock),
            Err(e) => Err(self.lock_error(e)),
        }
    }

    /// Block until the lock is acquired.
    ///
    /// Interrupted calls are retried; only real failures are returned.
    pub fn wait_lock(&self, mode: LockMode) -> Result<()> {
        loop {
            let attempt = match mode {
                LockMode::Exclusive => FileExt::lock_exclusive(&self.file),
                LockMode::Shared => FileExt::lock_shared(&self.file),
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.lock_error(e)),
            }
        }
    }

    /// Release whatever lock this handle holds.
    pub fn unlock(&self) -> Result<()> {
        FileExt::unlock(&self.file).map_err(|e| self.lock_error(e))
    }

    /// Identity of the open file, from the handle.
    pub fn identity(&self) -> Result<FileIdentity> {
        let meta = self.file.metadata().map_err(|e| self.io_error(e))?;
        Ok(FileIdentity::of(&meta))
    }

    /// Identity of whatever the path currently names, or `None` if nothing.
    pub fn path_identity(&self) -> Result<Option<FileIdentity>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(FileIdentity::of(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Whether the path still names the file this handle has open.
    pub fn is_current(&self) -> Result<bool> {
        let held = self.identity()?;
        Ok(self.path_identity()? == Some(held))
    }

    /// Remove the path from the filesystem. The handle stays open.
    pub fn unlink(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| self.io_error(e))
    }

    pub(crate) fn io_error(&self, source: io::Error) -> LockrunError {
        LockrunError::LockFileIo {
            path: self.path.clone(),
            source,
        }
    }

    fn lock_error(&self, source: io::Error) -> LockrunError {
        LockrunError::LockFailed {
            path: self.path.clone(),
            source,
        }
    }
}

impl Read for LockFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LockFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

fn open_error(path: &Path, create: bool, source: io::Error) -> LockrunError {
    if !create && source.kind() == io::ErrorKind::NotFound {
        LockrunError::LockFileMissing {
            path: path.to_path_buf(),
        }
    } else {
        LockrunError::CannotOpen {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

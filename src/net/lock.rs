//! Cross-process exclusive file locks.
//!
//! # Design Decisions
//! - `flock(LOCK_EX | LOCK_NB)`: never waits, fails fast when held
//! - The lock lives exactly as long as the `FileLock` value; dropping it
//!   closes the descriptor, which releases the lock
//! - flock locks belong to the open file description, so two acquisitions
//!   inside one process conflict just like across processes

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Suffix appended to a socket path to name its lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Error type for lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file {} is in use by another process already", path.display())]
    Held { path: PathBuf },

    #[error("could not acquire the lock {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Derive the lock file path for a Unix socket path.
pub fn lock_path_for(socket_path: &Path) -> PathBuf {
    let mut name = socket_path.as_os_str().to_owned();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// A held exclusive lock.
pub struct FileLock {
    /// Held open for the lifetime of the lock.
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to take the lock at `path`, creating the file if needed.
    pub fn try_acquire(path: &Path) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        if try_flock_exclusive(&file).map_err(io_err)? {
            tracing::debug!(path = %path.display(), "Lock acquired");
            Ok(Self {
                _file: file,
                path: path.to_path_buf(),
            })
        } else {
            Err(LockError::Held {
                path: path.to_path_buf(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "Lock released");
    }
}

/// Returns `Ok(false)` when another holder has the lock.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: fd is a valid descriptor owned by `file` for the whole call.
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

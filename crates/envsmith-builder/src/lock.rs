//! Advisory lock serializing builds.
//!
//! Builds of the same store must not overlap. The lock is a non-blocking
//! exclusive `flock` on a file in the data directory: a second build fails
//! immediately with `BuildInProgress` instead of waiting.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use envsmith_common::error::{EnvsmithError, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

/// Held build lock. Released on drop.
#[derive(Debug)]
pub struct BuildLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl BuildLock {
    /// Acquires the lock at `path`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::BuildInProgress` if another holder exists,
    /// or `EnvsmithError::Io` if the file cannot be opened or locked.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| EnvsmithError::io(path, e))?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                tracing::debug!(path = %path.display(), "build lock acquired");
                Ok(Self {
                    _lock: lock,
                    path: path.to_path_buf(),
                })
            }
            Err((_, Errno::EWOULDBLOCK)) => Err(EnvsmithError::BuildInProgress {
                lock: path.to_path_buf(),
            }),
            Err((_, errno)) => Err(EnvsmithError::io(path, std::io::Error::from(errno))),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

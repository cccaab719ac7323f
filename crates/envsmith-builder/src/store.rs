//! On-disk environment store.
//!
//! Layout: one directory per environment under the store root. A
//! directory is an environment only once its `environment.json` record
//! exists. The record is written last, through a temporary file and a
//! rename, so readers see either no environment or a complete one.

use std::path::{Path, PathBuf};

use envsmith_common::constants::{RECORD_FILE, RETIRED_PREFIX};
use envsmith_common::error::{EnvsmithError, Result};
use envsmith_common::types::EnvName;

use crate::record::{Environment, EnvironmentRecord};

/// Manages the directory holding all environments.
#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    root: PathBuf,
}

impl EnvironmentStore {
    /// Opens the store at `root` without touching the filesystem.
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        tracing::debug!(path = %root.display(), "opening environment store");
        Self { root }
    }

    /// Creates the store root if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| EnvsmithError::io(&self.root, e))
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory an environment lives in.
    #[must_use]
    pub fn env_path(&self, name: &EnvName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Looks up a complete environment by name.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::EnvironmentNotFound` if the name is not a
    /// valid environment name or no record exists under it, and
    /// `EnvsmithError::Serialization` if the record is corrupt.
    pub fn lookup(&self, name: &str) -> Result<Environment> {
        let not_found = || EnvsmithError::EnvironmentNotFound {
            name: name.to_string(),
        };
        let env_name = EnvName::new(name).map_err(|_| not_found())?;
        let root = self.env_path(&env_name);
        let record_path = root.join(RECORD_FILE);
        let content = match std::fs::read_to_string(&record_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(EnvsmithError::io(record_path, e)),
        };
        let record: EnvironmentRecord = serde_json::from_str(&content)?;
        if record.name != env_name {
            return Err(EnvsmithError::Config {
                message: format!(
                    "record at {} names environment \"{}\"",
                    record_path.display(),
                    record.name
                ),
            });
        }
        Ok(Environment { root, record })
    }

    /// Lists all complete environments, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store root exists but cannot be read.
    pub fn list(&self) -> Result<Vec<Environment>> {
        let mut environments = Vec::new();
        for name in self.entry_names()? {
            match self.lookup(&name) {
                Ok(env) => environments.push(env),
                Err(EnvsmithError::EnvironmentNotFound { .. }) => {}
                Err(e) => tracing::warn!(name = %name, error = %e, "skipping unreadable environment"),
            }
        }
        environments.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(environments)
    }

    /// Removes an environment.
    ///
    /// The directory is first renamed aside so the environment disappears
    /// atomically, then deleted.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::EnvironmentNotFound` if it does not exist.
    pub fn remove(&self, name: &str) -> Result<()> {
        let env = self.lookup(name)?;
        if let Some(retired) = self.retire(env.name())? {
            self.purge(&retired);
        }
        tracing::info!(name = %name, "environment removed");
        Ok(())
    }

    /// Writes the record for a freshly installed environment.
    ///
    /// This is the commit point of a build.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment directory is missing or the
    /// record cannot be written.
    pub fn commit(&self, record: EnvironmentRecord) -> Result<Environment> {
        let root = self.env_path(&record.name);
        if !root.is_dir() {
            return Err(EnvsmithError::io(
                &root,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "resolver did not create the environment directory",
                ),
            ));
        }
        let json = serde_json::to_string_pretty(&record)?;
        let tmp = root.join(format!("{RECORD_FILE}.tmp"));
        let target = root.join(RECORD_FILE);
        std::fs::write(&tmp, json).map_err(|e| EnvsmithError::io(&tmp, e))?;
        std::fs::rename(&tmp, &target).map_err(|e| EnvsmithError::io(&target, e))?;
        tracing::debug!(path = %target.display(), "environment record committed");
        Ok(Environment { root, record })
    }

    /// Moves an existing environment directory out of the way.
    ///
    /// Returns the new location, or `None` when nothing existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn retire(&self, name: &EnvName) -> Result<Option<PathBuf>> {
        let current = self.env_path(name);
        if !current.exists() {
            return Ok(None);
        }
        let retired = self
            .root
            .join(format!("{RETIRED_PREFIX}{}", uuid::Uuid::new_v4()));
        std::fs::rename(&current, &retired).map_err(|e| EnvsmithError::io(&current, e))?;
        tracing::debug!(from = %current.display(), to = %retired.display(), "environment retired");
        Ok(Some(retired))
    }

    /// Puts a retired directory back under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn restore(&self, retired: &Path, name: &EnvName) -> Result<()> {
        let target = self.env_path(name);
        std::fs::rename(retired, &target).map_err(|e| EnvsmithError::io(&target, e))?;
        tracing::info!(name = %name, "previous environment restored");
        Ok(())
    }

    /// Deletes an environment directory that never got a record.
    pub fn discard(&self, name: &EnvName) {
        self.purge(&self.env_path(name));
    }

    /// Deletes a directory, logging instead of failing.
    pub fn purge(&self, path: &Path) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "directory purged"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to purge directory"),
        }
    }

    /// Removes leftovers of interrupted builds: retired directories and
    /// environment directories without a record.
    ///
    /// Must only run while the build lock is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the store root cannot be read.
    pub fn sweep_incomplete(&self) -> Result<usize> {
        let mut swept = 0;
        for name in self.entry_names()? {
            let path = self.root.join(&name);
            let stale = name.starts_with('.') || !path.join(RECORD_FILE).is_file();
            if stale && path.is_dir() {
                tracing::warn!(path = %path.display(), "removing leftover of an interrupted build");
                self.purge(&path);
                swept += 1;
            }
        }
        Ok(swept)
    }

    fn entry_names(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EnvsmithError::io(&self.root, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EnvsmithError::io(&self.root, e))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// Returns the total size in bytes of regular files under `path`.
///
/// Symlinks are not followed. Unreadable entries are skipped.
#[must_use]
pub fn disk_usage(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(std::result::Result::ok)
        .map(|entry| match entry.file_type() {
            Ok(ft) if ft.is_dir() => disk_usage(&entry.path()),
            Ok(ft) if ft.is_file() => entry.metadata().map_or(0, |m| m.len()),
            _ => 0,
        })
        .sum()
}

//! Per-build transient caches.
//!
//! Each build gets its own `<cache>/<build-id>/` with a package download
//! directory and a pip cache. Eviction deletes the build's directory and,
//! when nothing else is left, the cache root itself.

use std::path::{Path, PathBuf};

use envsmith_common::error::{EnvsmithError, Result};

/// Transient cache directories owned by one build.
#[derive(Debug)]
pub struct BuildCaches {
    cache_root: PathBuf,
    build_dir: PathBuf,
    packages: PathBuf,
    pip: PathBuf,
}

impl BuildCaches {
    /// Creates the cache directories for `build_id` under `cache_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn create(cache_root: &Path, build_id: &str) -> Result<Self> {
        let build_dir = cache_root.join(build_id);
        let packages = build_dir.join("pkgs");
        let pip = build_dir.join("pip");
        for dir in [&packages, &pip] {
            std::fs::create_dir_all(dir).map_err(|e| EnvsmithError::io(dir, e))?;
        }
        tracing::debug!(path = %build_dir.display(), "build caches created");
        Ok(Self {
            cache_root: cache_root.to_path_buf(),
            build_dir,
            packages,
            pip,
        })
    }

    /// Deletes every build directory left under `cache_root` and returns
    /// how many were removed.
    ///
    /// Only call this while holding the build lock: no other build's
    /// caches may be in use.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root exists but cannot be read.
    pub fn sweep(cache_root: &Path) -> Result<usize> {
        let entries = match std::fs::read_dir(cache_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(EnvsmithError::io(cache_root, e)),
        };
        let mut swept = 0;
        for entry in entries {
            let path = entry.map_err(|e| EnvsmithError::io(cache_root, e))?.path();
            tracing::warn!(path = %path.display(), "removing stale build cache");
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match removed {
                Ok(()) => swept += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove stale cache"),
            }
        }
        Ok(swept)
    }

    /// Directory for downloaded package archives.
    #[must_use]
    pub fn packages(&self) -> &Path {
        &self.packages
    }

    /// Directory for the pip HTTP and wheel cache.
    #[must_use]
    pub fn pip(&self) -> &Path {
        &self.pip
    }

    /// Directory holding everything for this build.
    #[must_use]
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Deletes this build's caches.
    ///
    /// Safe to call more than once, and after a failed build.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cache directory cannot be removed.
    pub fn evict(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.build_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(EnvsmithError::io(&self.build_dir, e)),
        }
        // Fails harmlessly while another build's caches are still present.
        let _ = std::fs::remove_dir(&self.cache_root);
        tracing::debug!(path = %self.build_dir.display(), "build caches evicted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_makes_both_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let caches = BuildCaches::create(&dir.path().join("cache"), "b1").expect("create");
        assert!(caches.packages().is_dir());
        assert!(caches.pip().is_dir());
        assert!(caches.build_dir().ends_with("cache/b1"));
    }

    #[test]
    fn evict_removes_contents_and_empty_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("cache");
        let caches = BuildCaches::create(&root, "b1").expect("create");
        std::fs::write(caches.packages().join("foo-1.0.tar.bz2"), b"archive").expect("write");
        caches.evict().expect("evict");
        assert!(!root.exists());
    }

    #[test]
    fn evict_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let caches = BuildCaches::create(&dir.path().join("cache"), "b1").expect("create");
        caches.evict().expect("first");
        caches.evict().expect("second");
    }

    #[test]
    fn evict_leaves_other_builds_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("cache");
        let first = BuildCaches::create(&root, "b1").expect("create");
        let second = BuildCaches::create(&root, "b2").expect("create");
        first.evict().expect("evict");
        assert!(second.build_dir().exists());
        assert!(root.exists());
    }

    #[test]
    fn sweep_removes_every_stale_build() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("cache");
        let crashed = BuildCaches::create(&root, "crashed").expect("create");
        std::fs::write(crashed.packages().join("foo-1.0.tar.bz2"), b"archive").expect("write");
        let _ = BuildCaches::create(&root, "other").expect("create");

        assert_eq!(BuildCaches::sweep(&root).expect("sweep"), 2);
        assert_eq!(std::fs::read_dir(&root).expect("read").count(), 0);
    }

    #[test]
    fn sweep_without_cache_root_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(BuildCaches::sweep(&dir.path().join("cache")).expect("sweep"), 0);
    }
}

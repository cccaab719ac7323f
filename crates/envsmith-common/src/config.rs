//! Global configuration model for envsmith.
//!
//! Defaults come from [`crate::constants`]. A `config.json` inside the data
//! directory may override them, and the CLI applies flags and environment
//! variables on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CACHE_DIR, CONFIG_FILE, ENVS_DIR, LOCK_FILE};
use crate::error::{EnvsmithError, Result};

/// Root configuration for envsmith.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvsmithConfig {
    /// Base directory for environments, caches, and the build lock.
    pub data_dir: PathBuf,
    /// Settings for the external package resolver.
    pub resolver: ResolverConfig,
}

/// Settings for the external package resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolver executable. Auto-detected on `PATH` when unset.
    pub program: Option<PathBuf>,
    /// Extra arguments appended to every `create` invocation.
    pub extra_args: Vec<String>,
}

impl Default for EnvsmithConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::constants::data_dir().clone(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl EnvsmithConfig {
    /// Loads the configuration rooted at `data_dir`.
    ///
    /// Reads `<data_dir>/config.json` when present. The returned config
    /// always uses `data_dir` as its data directory, whatever the file says.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "loading configuration file");
            let content =
                std::fs::read_to_string(&path).map_err(|e| EnvsmithError::io(&path, e))?;
            serde_json::from_str::<Self>(&content).map_err(|e| EnvsmithError::Config {
                message: format!("{}: {e}", path.display()),
            })?
        } else {
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Directory holding one subdirectory per environment.
    #[must_use]
    pub fn envs_dir(&self) -> PathBuf {
        self.data_dir.join(ENVS_DIR)
    }

    /// Directory holding per-build transient caches.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(CACHE_DIR)
    }

    /// Path of the advisory build lock.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }
}

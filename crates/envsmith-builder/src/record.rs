//! Persistent environment records and activation descriptors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use envsmith_common::types::{EnvName, Sha256Hash};
use serde::{Deserialize, Serialize};

use crate::resolver::InstalledSet;

/// What activating an environment adds to a process environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationDescriptor {
    /// Installation prefix of the environment.
    pub prefix: PathBuf,
    /// Directories prepended to `PATH`, highest priority first.
    pub path_dirs: Vec<PathBuf>,
    /// Variables set verbatim, replacing inherited values.
    pub variables: BTreeMap<String, String>,
}

impl ActivationDescriptor {
    /// Builds the descriptor for a conda-layout prefix.
    ///
    /// Sets `CONDA_PREFIX` and `CONDA_DEFAULT_ENV` the way `conda activate`
    /// does, then the manifest's own variables, which win on collision.
    /// `prefix` must be absolute.
    #[must_use]
    pub fn for_prefix(
        name: &EnvName,
        prefix: &Path,
        manifest_variables: &BTreeMap<String, String>,
    ) -> Self {
        debug_assert!(prefix.is_absolute(), "relative prefix {}", prefix.display());
        let mut variables = BTreeMap::new();
        let _ = variables.insert(
            "CONDA_PREFIX".to_string(),
            prefix.to_string_lossy().into_owned(),
        );
        let _ = variables.insert("CONDA_DEFAULT_ENV".to_string(), name.to_string());
        variables.extend(manifest_variables.clone());
        Self {
            prefix: prefix.to_path_buf(),
            path_dirs: vec![prefix.join("bin")],
            variables,
        }
    }
}

/// The `environment.json` record stored inside every environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    /// Environment name.
    pub name: EnvName,
    /// Digest of the manifest the environment was built from.
    pub manifest_digest: Sha256Hash,
    /// RFC 3339 timestamp of the build.
    pub created_at: String,
    /// Resolver that installed the packages.
    pub resolver: String,
    /// Channels the build resolved against.
    pub channels: Vec<String>,
    /// Requirement specs handed to the resolver.
    pub requirements: Vec<String>,
    /// Packages actually installed.
    pub packages: InstalledSet,
    /// Activation overlay for the executor.
    pub activation: ActivationDescriptor,
}

/// A materialized environment: its directory and its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Directory the environment lives in.
    pub root: PathBuf,
    /// The environment's record.
    pub record: EnvironmentRecord,
}

impl Environment {
    /// Returns the environment name.
    #[must_use]
    pub fn name(&self) -> &EnvName {
        &self.record.name
    }

    /// Returns the activation descriptor.
    #[must_use]
    pub fn activation(&self) -> &ActivationDescriptor {
        &self.record.activation
    }
}

//! Seam between the builder and an external package resolver.
//!
//! The builder never resolves dependency graphs itself. It hands the full
//! requirement set to a [`Resolver`] in one call and records whatever the
//! resolver installed.

pub mod conda;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use envsmith_manifest::Requirement;

use crate::cache::BuildCaches;

/// Everything a resolver needs for one atomic resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// Environment name, for diagnostics.
    pub environment: &'a str,
    /// Directory to install into. The resolver creates it.
    pub prefix: &'a Path,
    /// Ordered channel list.
    pub channels: &'a [String],
    /// Primary-level requirements, already consolidated.
    pub primary: &'a [Requirement],
    /// Pip-level requirements, already consolidated.
    pub pip: &'a [Requirement],
    /// Transient caches the resolver must confine its downloads to.
    pub caches: &'a BuildCaches,
}

/// One package present in a materialized environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Build string, when the resolver reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Channel or index the package came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// The installed package set, sorted so equal sets compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledSet {
    packages: Vec<InstalledPackage>,
}

impl InstalledSet {
    /// Builds a set, sorting and de-duplicating the packages.
    #[must_use]
    pub fn new(mut packages: Vec<InstalledPackage>) -> Self {
        packages.sort();
        packages.dedup();
        Self { packages }
    }

    /// Returns the packages in sorted order.
    #[must_use]
    pub fn packages(&self) -> &[InstalledPackage] {
        &self.packages
    }

    /// Returns the number of installed packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns `true` when nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Looks up a package by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Failure reported by a resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The constraints cannot be satisfied by the available packages.
    #[error("unsatisfiable requirements: {message}")]
    Unsatisfiable {
        /// Resolver diagnostics.
        message: String,
    },

    /// The resolver tool itself failed or is unavailable.
    #[error("{} failed: {message}", .program.display())]
    Tool {
        /// Program that failed.
        program: PathBuf,
        /// What went wrong.
        message: String,
    },
}

/// An external package resolver and installer.
///
/// Implementations must install everything into `request.prefix` in a
/// single pass and keep downloads inside `request.caches`.
pub trait Resolver {
    /// Short name recorded in environment records.
    fn name(&self) -> &str;

    /// Resolves and installs the full requirement set.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsatisfiable`] when the constraints cannot
    /// be met, or [`ResolveError::Tool`] when the tool fails otherwise.
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<InstalledSet, ResolveError>;
}

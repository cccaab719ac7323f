//! # envsmith-manifest
//!
//! Parser and validator for environment manifests.
//!
//! Handles:
//! - **Document**: the YAML file shape (`name`, `channels`, `dependencies`,
//!   nested `pip` list, `variables`).
//! - **Requirement**: the requirement string grammar.
//! - **Validator**: structural checks on the parsed model.
//! - **Consolidate**: merging duplicates and catching provable conflicts.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod consolidate;
mod document;
pub mod model;
pub mod requirement;
pub mod validator;
pub mod version;

use std::path::Path;

use envsmith_common::error::{EnvsmithError, Result};

pub use self::model::{Level, Manifest, Requirement};

/// Parses and validates a manifest from its source text.
///
/// # Errors
///
/// Returns `EnvsmithError::ManifestInvalid` if the input is malformed or
/// fails validation.
pub fn parse_manifest(input: &str) -> Result<Manifest> {
    let manifest = document::from_yaml(input)?;
    validator::validate(&manifest)?;
    tracing::info!(
        name = %manifest.name,
        requirements = manifest.requirements.len(),
        channels = manifest.channels.len(),
        "manifest parsed"
    );
    Ok(manifest)
}

/// Reads, parses, and validates the manifest at `path`.
///
/// # Errors
///
/// Returns `EnvsmithError::ManifestInvalid` carrying `path` if the file
/// cannot be read, is malformed, or fails validation.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    tracing::debug!(path = %path.display(), "reading manifest");
    let content = std::fs::read_to_string(path).map_err(|e| EnvsmithError::ManifestInvalid {
        origin: Some(path.to_path_buf()),
        message: format!("cannot read file: {e}"),
    })?;
    parse_manifest(&content).map_err(|e| e.with_manifest_origin(path))
}

//! Activation contexts.
//!
//! An [`ActivationContext`] is the complete variable set a child process
//! starts with: the inherited environment, overlaid with the environment's
//! activation descriptor, overlaid with caller overrides. It is built once
//! per run and handed to the spawn call. The calling process's own
//! environment is never modified.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

use envsmith_builder::ActivationDescriptor;
use envsmith_common::error::{EnvsmithError, Result};

const PATH: &str = "PATH";

/// Immutable environment overlay for one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationContext {
    vars: BTreeMap<OsString, OsString>,
}

impl ActivationContext {
    /// Overlays `descriptor` on the current process environment.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::Config` if a descriptor directory cannot be
    /// placed on `PATH`.
    pub fn inherit(descriptor: &ActivationDescriptor) -> Result<Self> {
        Self::overlay(descriptor, std::env::vars_os())
    }

    /// Overlays `descriptor` on an explicit inherited environment.
    ///
    /// Descriptor directories are prepended to `PATH` ahead of the
    /// inherited entries, which are kept. Descriptor variables replace
    /// inherited ones of the same name. Everything else passes through.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::Config` if a descriptor directory contains
    /// the path separator.
    pub fn overlay(
        descriptor: &ActivationDescriptor,
        inherited: impl IntoIterator<Item = (OsString, OsString)>,
    ) -> Result<Self> {
        let mut vars: BTreeMap<OsString, OsString> = inherited.into_iter().collect();

        let mut dirs: Vec<PathBuf> = descriptor.path_dirs.clone();
        if let Some(existing) = vars.get(OsStr::new(PATH)) {
            dirs.extend(
                std::env::split_paths(existing)
                    .filter(|d| !d.as_os_str().is_empty() && !descriptor.path_dirs.contains(d)),
            );
        }
        let path = std::env::join_paths(&dirs).map_err(|e| EnvsmithError::Config {
            message: format!("cannot build PATH for {}: {e}", descriptor.prefix.display()),
        })?;
        let _ = vars.insert(PATH.into(), path);

        for (key, value) in &descriptor.variables {
            let _ = vars.insert(key.into(), value.into());
        }
        Ok(Self { vars })
    }

    /// Returns a copy with caller-supplied variables applied last.
    #[must_use]
    pub fn with_overrides<K, V>(&self, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut vars = self.vars.clone();
        vars.extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self { vars }
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    /// Returns the search path executables are resolved against.
    #[must_use]
    pub fn search_path(&self) -> Option<&OsStr> {
        self.get(PATH)
    }

    /// Iterates over all variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Makes this context the child's entire environment.
    pub fn apply_to(&self, command: &mut Command) {
        let _ = command.env_clear().envs(&self.vars);
    }
}

//! The all-or-nothing build operation.
//!
//! A build runs under the store-wide build lock:
//!
//! 1. Sweep leftovers of interrupted builds, caches included.
//! 2. Consolidate requirements, failing fast on provable conflicts.
//! 3. Skip the build when an environment with the same manifest digest
//!    already exists.
//! 4. Move any previous environment of the same name aside.
//! 5. Hand the full requirement set to the resolver in one pass.
//! 6. Commit the environment record, or discard the partial install and
//!    put the previous environment back.
//! 7. Evict the build's caches, whatever the outcome.

use std::path::Path;
use std::time::Instant;

use envsmith_common::config::EnvsmithConfig;
use envsmith_common::error::{EnvsmithError, Result};
use envsmith_common::types::{EnvName, Sha256Hash};
use envsmith_manifest::consolidate::consolidate;
use envsmith_manifest::{Level, Manifest, Requirement};

use crate::cache::BuildCaches;
use crate::lock::BuildLock;
use crate::record::{ActivationDescriptor, Environment, EnvironmentRecord};
use crate::resolver::{ResolveRequest, Resolver};
use crate::store::EnvironmentStore;

/// Knobs for a single build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Rebuild even when the existing environment matches the manifest.
    pub force: bool,
}

/// Builds environments into a store using a [`Resolver`].
#[derive(Debug)]
pub struct EnvironmentBuilder<R> {
    config: EnvsmithConfig,
    store: EnvironmentStore,
    resolver: R,
}

impl<R: Resolver> EnvironmentBuilder<R> {
    /// Creates a builder over the store described by `config`.
    #[must_use]
    pub fn new(config: EnvsmithConfig, resolver: R) -> Self {
        let store = EnvironmentStore::open(config.envs_dir());
        Self {
            config,
            store,
            resolver,
        }
    }

    /// Returns the store environments are built into.
    #[must_use]
    pub fn store(&self) -> &EnvironmentStore {
        &self.store
    }

    /// Materializes `manifest` as a named environment.
    ///
    /// Either the environment exists afterwards with exactly the resolved
    /// package set, or nothing changed: a failed rebuild leaves the
    /// previous environment of that name in place.
    ///
    /// # Errors
    ///
    /// - `EnvsmithError::BuildInProgress` if another build holds the lock.
    /// - `EnvsmithError::ResolutionFailed` on conflicting requirements or
    ///   any resolver failure.
    /// - `EnvsmithError::Io` on filesystem failures.
    pub fn build(&self, manifest: &Manifest, options: BuildOptions) -> Result<Environment> {
        let started = Instant::now();
        let name = manifest.name.as_str();
        tracing::info!(name, force = options.force, "building environment");

        self.store.ensure_root()?;
        let _lock = BuildLock::acquire(&self.config.lock_file())?;

        let swept = self.store.sweep_incomplete()?;
        let swept = swept + BuildCaches::sweep(&self.config.cache_dir())?;
        if swept > 0 {
            tracing::info!(count = swept, "swept interrupted builds");
        }

        let requirements =
            consolidate(&manifest.requirements).map_err(|c| EnvsmithError::ResolutionFailed {
                environment: name.to_string(),
                message: c.to_string(),
            })?;

        let digest = manifest.digest();
        if !options.force {
            if let Some(existing) = self.up_to_date(name, &digest) {
                tracing::info!(name, digest = %digest, "environment already up to date");
                return Ok(existing);
            }
        }

        let build_id = uuid::Uuid::new_v4().to_string();
        let caches = match BuildCaches::create(&self.config.cache_dir(), &build_id) {
            Ok(caches) => caches,
            Err(e) => {
                let _ = std::fs::remove_dir_all(self.config.cache_dir().join(&build_id));
                return Err(e);
            }
        };

        let outcome = self.materialize(manifest, &requirements, digest, &caches);

        if let Err(e) = caches.evict() {
            tracing::warn!(error = %e, "failed to evict build caches");
        }

        match &outcome {
            Ok(env) => tracing::info!(
                name,
                packages = env.record.packages.len(),
                elapsed_ms = started.elapsed().as_millis(),
                "environment built"
            ),
            Err(e) => tracing::error!(
                name,
                error = %e,
                elapsed_ms = started.elapsed().as_millis(),
                "build failed"
            ),
        }
        outcome
    }

    fn up_to_date(&self, name: &str, digest: &Sha256Hash) -> Option<Environment> {
        self.store
            .lookup(name)
            .ok()
            .filter(|env| env.record.manifest_digest == *digest)
    }

    fn materialize(
        &self,
        manifest: &Manifest,
        requirements: &[Requirement],
        digest: Sha256Hash,
        caches: &BuildCaches,
    ) -> Result<Environment> {
        let name = &manifest.name;
        // The record outlives the caller's working directory.
        let prefix = self.store.env_path(name);
        let prefix = std::path::absolute(&prefix).map_err(|e| EnvsmithError::io(&prefix, e))?;
        let retired = self.store.retire(name)?;

        let (primary, pip): (Vec<Requirement>, Vec<Requirement>) = requirements
            .iter()
            .cloned()
            .partition(|r| r.level == Level::Primary);
        let request = ResolveRequest {
            environment: name.as_str(),
            prefix: &prefix,
            channels: &manifest.channels,
            primary: &primary,
            pip: &pip,
            caches,
        };

        let committed = self
            .resolver
            .resolve(&request)
            .map_err(|e| EnvsmithError::ResolutionFailed {
                environment: name.to_string(),
                message: e.to_string(),
            })
            .and_then(|packages| {
                self.store.commit(EnvironmentRecord {
                    name: name.clone(),
                    manifest_digest: digest,
                    created_at: chrono::Utc::now().to_rfc3339(),
                    resolver: self.resolver.name().to_string(),
                    channels: manifest.channels.clone(),
                    requirements: requirements.iter().map(Requirement::to_spec).collect(),
                    packages,
                    activation: ActivationDescriptor::for_prefix(
                        name,
                        &prefix,
                        &manifest.variables,
                    ),
                })
            });

        match committed {
            Ok(env) => {
                if let Some(old) = retired {
                    self.store.purge(&old);
                }
                Ok(env)
            }
            Err(e) => {
                self.store.discard(name);
                if let Some(old) = retired {
                    self.rollback(&old, name, &e);
                }
                Err(e)
            }
        }
    }

    fn rollback(&self, retired: &Path, name: &EnvName, cause: &EnvsmithError) {
        tracing::debug!(name = %name, cause = %cause, "restoring previous environment");
        if let Err(e) = self.store.restore(retired, name) {
            tracing::error!(
                name = %name,
                retired = %retired.display(),
                error = %e,
                "failed to restore previous environment"
            );
        }
    }
}

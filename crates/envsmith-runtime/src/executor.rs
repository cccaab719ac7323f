//! The scoped `run` operation.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use envsmith_builder::EnvironmentStore;
use envsmith_common::error::{EnvsmithError, Result};

use crate::activation::ActivationContext;
use crate::entry::EntryPoint;
use crate::isolation::Isolation;
use crate::supervisor::{self, ChildExit, ChildSlot};

/// One invocation of an entry point.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Name of the environment to activate.
    pub environment: String,
    /// What to run.
    pub entry: EntryPoint,
    /// Arguments passed through verbatim.
    pub args: Vec<OsString>,
    /// Variables applied on top of the activation overlay.
    pub overrides: Vec<(String, String)>,
    /// Restrictions applied to the child.
    pub isolation: Isolation,
    /// Working directory; the caller's when `None`.
    pub cwd: Option<PathBuf>,
}

impl RunRequest {
    /// Creates a request with no arguments, overrides, or isolation.
    pub fn new(environment: impl Into<String>, entry: EntryPoint) -> Self {
        Self {
            environment: environment.into(),
            entry,
            args: Vec::new(),
            overrides: Vec::new(),
            isolation: Isolation::None,
            cwd: None,
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds a variable override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Sets the isolation level.
    #[must_use]
    pub const fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Runs entry points inside environments of a store.
///
/// The store is only ever read.
#[derive(Debug, Clone)]
pub struct ScopedExecutor {
    store: EnvironmentStore,
    slot: ChildSlot,
}

impl ScopedExecutor {
    /// Creates an executor with its own child slot.
    #[must_use]
    pub fn new(store: EnvironmentStore) -> Self {
        Self::with_slot(store, ChildSlot::new())
    }

    /// Creates an executor registering children in `slot`, typically one
    /// with signal forwarding installed.
    #[must_use]
    pub const fn with_slot(store: EnvironmentStore, slot: ChildSlot) -> Self {
        Self { store, slot }
    }

    /// Returns the slot running children are registered in.
    #[must_use]
    pub const fn slot(&self) -> &ChildSlot {
        &self.slot
    }

    /// Activates the environment, runs the entry point, and returns how
    /// the child ended.
    ///
    /// Nothing is spawned unless the environment exists and the entry
    /// point resolves.
    ///
    /// # Errors
    ///
    /// - `EnvsmithError::EnvironmentNotFound` for an unknown environment.
    /// - `EnvsmithError::EntryPointUnresolved` if the entry point cannot
    ///   be found or executed in the activation context.
    /// - `EnvsmithError::SpawnError` if the OS refuses to start it.
    pub fn run(&self, request: &RunRequest) -> Result<ChildExit> {
        let env = self.store.lookup(&request.environment)?;
        let context = ActivationContext::inherit(env.activation())?
            .with_overrides(request.overrides.iter().cloned());

        let cwd = match &request.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().map_err(|e| EnvsmithError::io(".", e))?,
        };
        let resolved = request
            .entry
            .resolve(&context, &env.activation().prefix, &cwd)?;

        let mut command = Command::new(&resolved.program);
        let _ = command
            .args(&resolved.leading_args)
            .args(&request.args)
            .current_dir(&cwd);
        context.apply_to(&mut command);
        request.isolation.configure(&mut command)?;

        tracing::info!(
            environment = %env.name(),
            entry = %request.entry,
            program = %resolved.program.display(),
            args = request.args.len(),
            isolation = ?request.isolation,
            "running entry point"
        );
        let exit = supervisor::spawn_and_wait(command, &resolved.program, &self.slot)?;
        tracing::info!(
            environment = %env.name(),
            code = exit.code(),
            success = exit.success(),
            "entry point exited"
        );
        Ok(exit)
    }
}

//! Unified error taxonomy for the envsmith workspace.
//!
//! Every variant knows which phase it belongs to and which process exit
//! code the CLI reports for it. Build-phase failures all share one code so
//! callers can tell them apart from entry-point failures.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{
    EXIT_BUILD_FAILURE, EXIT_ENTRY_UNRESOLVED, EXIT_ENV_NOT_FOUND, EXIT_GENERAL_FAILURE,
    EXIT_SPAWN_FAILED,
};

/// Lifecycle phase an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Provisioning: manifest parsing, resolution, persisting an environment.
    Build,
    /// Execution of an entry point inside an existing environment.
    Run,
    /// Anything outside the two phases (configuration, listing, removal).
    General,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Run => write!(f, "run"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum EnvsmithError {
    /// The manifest is malformed or structurally inconsistent.
    #[error("invalid manifest{}: {message}", display_origin(.origin.as_ref()))]
    ManifestInvalid {
        /// File the manifest was read from, when known.
        origin: Option<PathBuf>,
        /// Description of the problem.
        message: String,
    },

    /// The resolver could not satisfy the requirement set.
    #[error("could not resolve environment \"{environment}\": {message}")]
    ResolutionFailed {
        /// Environment being built.
        environment: String,
        /// Resolver diagnostics.
        message: String,
    },

    /// Another build holds the build lock.
    #[error("another build is in progress (lock held on {})", .lock.display())]
    BuildInProgress {
        /// Path of the contended lock file.
        lock: PathBuf,
    },

    /// No environment is registered under the requested name.
    #[error("environment not found: {name}")]
    EnvironmentNotFound {
        /// Requested environment name.
        name: String,
    },

    /// The entry point does not exist or is not executable in the activation context.
    #[error("cannot resolve entry point \"{entry}\": {message}")]
    EntryPointUnresolved {
        /// Entry point as supplied by the caller.
        entry: String,
        /// Why resolution failed.
        message: String,
    },

    /// The operating system refused to start the child process.
    #[error("failed to spawn {}: {source}", .program.display())]
    SpawnError {
        /// Resolved program path.
        program: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization of a record failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

fn display_origin(origin: Option<&PathBuf>) -> String {
    origin.map_or_else(String::new, |p| format!(" ({})", p.display()))
}

impl EnvsmithError {
    /// Builds an [`EnvsmithError::Io`] from a path and error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`EnvsmithError::ManifestInvalid`] with no file origin.
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            origin: None,
            message: message.into(),
        }
    }

    /// Returns the phase this error belongs to.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::ManifestInvalid { .. }
            | Self::ResolutionFailed { .. }
            | Self::BuildInProgress { .. } => Phase::Build,
            Self::EnvironmentNotFound { .. }
            | Self::EntryPointUnresolved { .. }
            | Self::SpawnError { .. } => Phase::Run,
            Self::Io { .. } | Self::Config { .. } | Self::Serialization { .. } => Phase::General,
        }
    }

    /// Returns the distinguishing kind name reported to users.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ManifestInvalid { .. } => "ManifestInvalid",
            Self::ResolutionFailed { .. } => "ResolutionFailed",
            Self::BuildInProgress { .. } => "BuildInProgress",
            Self::EnvironmentNotFound { .. } => "EnvironmentNotFound",
            Self::EntryPointUnresolved { .. } => "EntryPointUnresolved",
            Self::SpawnError { .. } => "SpawnError",
            Self::Io { .. } => "Io",
            Self::Config { .. } => "Config",
            Self::Serialization { .. } => "Serialization",
        }
    }

    /// Returns the process exit code the CLI uses for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ManifestInvalid { .. }
            | Self::ResolutionFailed { .. }
            | Self::BuildInProgress { .. } => EXIT_BUILD_FAILURE,
            Self::EnvironmentNotFound { .. } => EXIT_ENV_NOT_FOUND,
            Self::EntryPointUnresolved { .. } => EXIT_ENTRY_UNRESOLVED,
            Self::SpawnError { .. } => EXIT_SPAWN_FAILED,
            Self::Io { .. } | Self::Config { .. } | Self::Serialization { .. } => {
                EXIT_GENERAL_FAILURE
            }
        }
    }

    /// Attaches the manifest file path to a [`EnvsmithError::ManifestInvalid`].
    ///
    /// Other variants pass through unchanged.
    #[must_use]
    pub fn with_manifest_origin(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::ManifestInvalid { message, .. } => Self::ManifestInvalid {
                origin: Some(path.into()),
                message,
            },
            other => other,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EnvsmithError>;

//! Resolver backed by a conda-compatible command line tool.
//!
//! Works with `micromamba`, `mamba`, or `conda`. One build runs at most
//! three invocations:
//!
//! 1. `create --prefix P` with every primary requirement, solved at once.
//! 2. `P/bin/python -m pip install` with every pip requirement, when any.
//! 3. `list --prefix P --json` to record what ended up installed.
//!
//! Package downloads go to the build's cache through `CONDA_PKGS_DIRS` and
//! `PIP_CACHE_DIR`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use envsmith_common::config::ResolverConfig;
use serde::Deserialize;

use super::{InstalledPackage, InstalledSet, ResolveError, ResolveRequest, Resolver};

/// Programs probed on `PATH`, in order of preference.
const CANDIDATES: [&str; 3] = ["micromamba", "mamba", "conda"];

/// Fragments of resolver diagnostics that mean "no solution exists".
const UNSATISFIABLE_MARKERS: [&str; 7] = [
    "unsatisfiable",
    "packagesnotfound",
    "could not solve",
    "nothing provides",
    "resolutionimpossible",
    "no matching distribution",
    "conflicting dependencies",
];

/// Which tool the resolver drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `micromamba`: needs its own root prefix.
    Micromamba,
    /// `mamba`.
    Mamba,
    /// `conda`, or anything unrecognized with the same CLI.
    Conda,
}

impl Flavor {
    fn of(program: &Path) -> Self {
        let stem = program
            .file_stem()
            .map(|s| s.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match stem.as_str() {
            "micromamba" => Self::Micromamba,
            "mamba" => Self::Mamba,
            _ => Self::Conda,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Micromamba => "micromamba",
            Self::Mamba => "mamba",
            Self::Conda => "conda",
        }
    }
}

/// Drives a conda-compatible tool as the external resolver.
#[derive(Debug, Clone)]
pub struct CondaResolver {
    program: PathBuf,
    flavor: Flavor,
    extra_args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListedPackage {
    name: String,
    version: String,
    #[serde(default)]
    build_string: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolFailure {
    #[serde(default)]
    exception_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl CondaResolver {
    /// Wraps an explicit program.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            flavor: Flavor::of(&program),
            program,
            extra_args,
        }
    }

    /// Locates the tool from configuration, or on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Tool`] if no usable program is found.
    pub fn detect(config: &ResolverConfig) -> Result<Self, ResolveError> {
        if let Some(program) = &config.program {
            let found = which::which(program).map_err(|e| ResolveError::Tool {
                program: program.clone(),
                message: format!("resolver not found: {e}"),
            })?;
            return Ok(Self::new(found, config.extra_args.clone()));
        }
        for candidate in CANDIDATES {
            if let Ok(found) = which::which(candidate) {
                tracing::debug!(program = %found.display(), "resolver detected");
                return Ok(Self::new(found, config.extra_args.clone()));
            }
        }
        Err(ResolveError::Tool {
            program: PathBuf::from(CANDIDATES.join("|")),
            message: "no conda-compatible resolver on PATH; set ENVSMITH_RESOLVER".into(),
        })
    }

    /// Returns the program being driven.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the detected tool flavor.
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn create_args(&self, request: &ResolveRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "create".into(),
            "--yes".into(),
            "--json".into(),
            "--prefix".into(),
            request.prefix.into(),
        ];
        if !request.channels.is_empty() {
            args.push("--override-channels".into());
            for channel in request.channels {
                args.push("--channel".into());
                args.push(channel.into());
            }
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args.extend(request.primary.iter().map(|r| OsString::from(r.to_spec())));
        args
    }

    fn list_args(prefix: &Path) -> Vec<OsString> {
        vec!["list".into(), "--json".into(), "--prefix".into(), prefix.into()]
    }

    fn pip_args(request: &ResolveRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-m".into(),
            "pip".into(),
            "install".into(),
            "--no-input".into(),
            "--disable-pip-version-check".into(),
        ];
        args.extend(request.pip.iter().map(|r| OsString::from(r.to_spec())));
        args
    }

    fn tool_command(&self, request: &ResolveRequest<'_>, args: Vec<OsString>) -> Command {
        let mut cmd = Command::new(&self.program);
        let _ = cmd
            .args(args)
            .env("CONDA_PKGS_DIRS", request.caches.packages())
            .env("PIP_CACHE_DIR", request.caches.pip())
            .env("CONDA_NOTIFY_OUTDATED_CONDA", "false");
        if self.flavor == Flavor::Micromamba {
            let _ = cmd.env("MAMBA_ROOT_PREFIX", request.caches.build_dir().join("root"));
        }
        cmd
    }

    fn install_pip(request: &ResolveRequest<'_>) -> Result<(), ResolveError> {
        let python = request.prefix.join("bin").join("python");
        if !python.is_file() {
            return Err(ResolveError::Tool {
                program: python,
                message: "pip requirements need a python interpreter in the dependencies".into(),
            });
        }
        let mut cmd = Command::new(&python);
        let _ = cmd
            .args(Self::pip_args(request))
            .env("PIP_CACHE_DIR", request.caches.pip())
            .env("PYTHONNOUSERSITE", "1")
            .env_remove("PYTHONPATH");
        let _ = run(&python, cmd)?;
        Ok(())
    }
}

impl Resolver for CondaResolver {
    fn name(&self) -> &str {
        self.flavor.as_str()
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<InstalledSet, ResolveError> {
        tracing::info!(
            environment = request.environment,
            program = %self.program.display(),
            primary = request.primary.len(),
            pip = request.pip.len(),
            "resolving environment"
        );

        let create = self.tool_command(request, self.create_args(request));
        let _ = run(&self.program, create)?;

        if !request.pip.is_empty() {
            Self::install_pip(request)?;
        }

        let list = self.tool_command(request, Self::list_args(request.prefix));
        let output = run(&self.program, list)?;
        parse_list(&self.program, &output.stdout)
    }
}

/// Runs a resolver step, turning a non-zero exit into a [`ResolveError`].
fn run(program: &Path, mut cmd: Command) -> Result<Output, ResolveError> {
    tracing::debug!(command = ?cmd, "running resolver step");
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ResolveError::Tool {
            program: program.to_path_buf(),
            message: e.to_string(),
        })?;
    if output.status.success() {
        return Ok(output);
    }
    Err(classify_failure(program, &output.stdout, &output.stderr))
}

fn classify_failure(program: &Path, stdout: &[u8], stderr: &[u8]) -> ResolveError {
    let failure: ToolFailure = serde_json::from_slice(stdout).unwrap_or_default();
    let stderr = String::from_utf8_lossy(stderr);
    let message = failure
        .message
        .or(failure.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| stderr.trim().to_string());

    let haystack = format!(
        "{} {message} {stderr}",
        failure.exception_name.as_deref().unwrap_or_default()
    )
    .to_ascii_lowercase();
    if UNSATISFIABLE_MARKERS.iter().any(|m| haystack.contains(m)) {
        ResolveError::Unsatisfiable { message }
    } else {
        ResolveError::Tool {
            program: program.to_path_buf(),
            message,
        }
    }
}

fn parse_list(program: &Path, stdout: &[u8]) -> Result<InstalledSet, ResolveError> {
    let listed: Vec<ListedPackage> =
        serde_json::from_slice(stdout).map_err(|e| ResolveError::Tool {
            program: program.to_path_buf(),
            message: format!("unreadable package list: {e}"),
        })?;
    Ok(InstalledSet::new(
        listed
            .into_iter()
            .map(|p| InstalledPackage {
                name: p.name,
                version: p.version,
                build: p.build_string.filter(|b| !b.is_empty()),
                channel: p.channel.filter(|c| !c.is_empty()),
            })
            .collect(),
    ))
}

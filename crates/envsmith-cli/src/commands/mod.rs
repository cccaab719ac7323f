//! CLI command definitions and dispatch.

pub mod build;
pub mod inspect;
pub mod list;
pub mod remove;
pub mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use envsmith_common::config::EnvsmithConfig;
use envsmith_common::constants::BIN_NAME;
use envsmith_common::error::Phase;

/// envsmith: declarative environments and scoped execution.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Base directory for environments, caches, and the build lock.
    #[arg(long, global = true, env = "ENVSMITH_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Resolver executable (micromamba, mamba, or conda).
    #[arg(long, global = true, env = "ENVSMITH_RESOLVER")]
    pub resolver: Option<PathBuf>,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Materialize the environment a manifest declares.
    Build(build::BuildArgs),
    /// Run an entry point inside an environment.
    Run(run::RunArgs),
    /// List environments.
    List(list::ListArgs),
    /// Show an environment's record.
    Inspect(inspect::InspectArgs),
    /// Delete an environment.
    Remove(remove::RemoveArgs),
}

impl Command {
    /// Phase failures of this command are reported under.
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Build(_) => Phase::Build,
            Self::Run(_) => Phase::Run,
            Self::List(_) | Self::Inspect(_) | Self::Remove(_) => Phase::General,
        }
    }
}

impl Cli {
    /// Resolves the effective configuration: file, then env vars and flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is unreadable or the
    /// data directory cannot be made absolute.
    pub fn config(&self) -> envsmith_common::error::Result<EnvsmithConfig> {
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| envsmith_common::constants::data_dir().clone());
        // Prefixes derived from the data dir are persisted in records.
        let data_dir = std::path::absolute(&data_dir)
            .map_err(|e| envsmith_common::error::EnvsmithError::io(&data_dir, e))?;
        let mut config = EnvsmithConfig::load(&data_dir)?;
        if let Some(program) = &self.resolver {
            config.resolver.program = Some(program.clone());
        }
        tracing::debug!(data_dir = %config.data_dir.display(), "configuration resolved");
        Ok(config)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.config()?;
    match cli.command {
        Command::Build(args) => build::execute(args, config),
        Command::Run(args) => run::execute(args, &config),
        Command::List(args) => list::execute(&args, &config),
        Command::Inspect(args) => inspect::execute(&args, &config),
        Command::Remove(args) => remove::execute(&args, &config),
    }
}

//! `envsmith list`: list environments.

use std::process::ExitCode;

use clap::Args;
use envsmith_builder::EnvironmentStore;
use envsmith_common::config::EnvsmithConfig;

use crate::output;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print records as a JSON array instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `list` command.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn execute(args: &ListArgs, config: &EnvsmithConfig) -> anyhow::Result<ExitCode> {
    let environments = EnvironmentStore::open(config.envs_dir()).list()?;
    tracing::debug!(count = environments.len(), "listing environments");
    if args.json {
        let records: Vec<_> = environments.iter().map(|env| &env.record).collect();
        output::print_json(&records)?;
    } else {
        output::print_environment_table(&environments);
    }
    Ok(ExitCode::SUCCESS)
}

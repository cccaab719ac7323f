//! `envsmith inspect`: show an environment's record.

use std::process::ExitCode;

use clap::Args;
use envsmith_builder::EnvironmentStore;
use envsmith_common::config::EnvsmithConfig;

use crate::output;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Environment name.
    pub name: String,

    /// Print only the installed packages, one `name version` per line.
    #[arg(long)]
    pub packages: bool,
}

/// Executes the `inspect` command.
///
/// # Errors
///
/// Returns an error if the environment does not exist.
pub fn execute(args: &InspectArgs, config: &EnvsmithConfig) -> anyhow::Result<ExitCode> {
    let env = EnvironmentStore::open(config.envs_dir()).lookup(&args.name)?;
    if args.packages {
        output::print_packages(&env.record.packages);
    } else {
        output::print_json(&env.record)?;
    }
    Ok(ExitCode::SUCCESS)
}

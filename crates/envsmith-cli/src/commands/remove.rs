//! `envsmith remove`: delete an environment.

use std::process::ExitCode;

use clap::Args;
use envsmith_builder::EnvironmentStore;
use envsmith_builder::lock::BuildLock;
use envsmith_common::config::EnvsmithConfig;

use crate::output;

/// Arguments for the `remove` command.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Environment name.
    pub name: String,
}

/// Executes the `remove` command.
///
/// Holds the build lock so a removal never races a build.
///
/// # Errors
///
/// Returns an error if the environment does not exist, a build is in
/// progress, or deletion fails.
pub fn execute(args: &RemoveArgs, config: &EnvsmithConfig) -> anyhow::Result<ExitCode> {
    let store = EnvironmentStore::open(config.envs_dir());
    let _ = store.lookup(&args.name)?;
    let _lock = BuildLock::acquire(&config.lock_file())?;
    store.remove(&args.name)?;
    output::print_removed(&args.name);
    Ok(ExitCode::SUCCESS)
}

//! `envsmith build`: materialize the environment a manifest declares.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use envsmith_builder::resolver::conda::CondaResolver;
use envsmith_builder::{BuildOptions, EnvironmentBuilder};
use envsmith_common::config::EnvsmithConfig;
use envsmith_common::error::EnvsmithError;

use crate::output;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the environment manifest.
    #[arg(long, short, default_value = "environment.yml")]
    pub manifest: PathBuf,

    /// Rebuild even if the environment already matches the manifest.
    #[arg(long)]
    pub force: bool,
}

/// Executes the `build` command.
///
/// # Errors
///
/// Returns an error if the manifest is invalid, no resolver is available,
/// or the build fails.
pub fn execute(args: BuildArgs, config: EnvsmithConfig) -> anyhow::Result<ExitCode> {
    let manifest = envsmith_manifest::load_manifest(&args.manifest)?;
    let resolver =
        CondaResolver::detect(&config.resolver).map_err(|e| EnvsmithError::ResolutionFailed {
            environment: manifest.name.to_string(),
            message: e.to_string(),
        })?;
    tracing::info!(
        program = %resolver.program().display(),
        flavor = ?resolver.flavor(),
        "using resolver"
    );

    let builder = EnvironmentBuilder::new(config, resolver);
    let env = builder.build(&manifest, BuildOptions { force: args.force })?;
    output::print_built(&env);
    Ok(ExitCode::SUCCESS)
}

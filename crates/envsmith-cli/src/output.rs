//! Formatted output helpers for CLI commands.
//!
//! Data goes to stdout. Failure reports go to stderr in the form
//! `error: <phase> phase failed [<Kind>]: <message>`.

use std::process::ExitCode;

use envsmith_builder::Environment;
use envsmith_builder::resolver::InstalledSet;
use envsmith_builder::store::disk_usage;
use envsmith_common::constants::{APP_NAME, EXIT_BUILD_FAILURE, EXIT_GENERAL_FAILURE};
use envsmith_common::error::{EnvsmithError, Phase};
use serde::Serialize;

/// Renders a size with binary units, one decimal from 1 KiB up.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const STEP: f64 = 1024.0;
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / STEP;
    let mut unit = UNITS[0];
    for &next in &UNITS[1..] {
        if value < STEP {
            break;
        }
        value /= STEP;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

/// Prints the summary line of a finished build.
#[allow(clippy::print_stdout)]
pub fn print_built(env: &Environment) {
    println!(
        "built {} ({} packages) at {}",
        env.name(),
        env.record.packages.len(),
        env.root.display()
    );
}

/// Prints environments as a table.
#[allow(clippy::print_stdout)]
pub fn print_environment_table(environments: &[Environment]) {
    println!("{:<24} {:>8} {:>10}  CREATED", "NAME", "PACKAGES", "SIZE");
    for env in environments {
        println!("{}", environment_row(env, disk_usage(&env.root)));
    }
}

fn environment_row(env: &Environment, size: u64) -> String {
    format!(
        "{:<24} {:>8} {:>10}  {}",
        env.name().as_str(),
        env.record.packages.len(),
        format_bytes(size),
        env.record.created_at
    )
}

/// Prints installed packages, one per line.
#[allow(clippy::print_stdout)]
pub fn print_packages(packages: &InstalledSet) {
    for pkg in packages.packages() {
        match &pkg.channel {
            Some(channel) => println!("{} {} ({channel})", pkg.name, pkg.version),
            None => println!("{} {}", pkg.name, pkg.version),
        }
    }
}

/// Prints a value as pretty JSON.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints the confirmation of a removal.
#[allow(clippy::print_stdout)]
pub fn print_removed(name: &str) {
    println!("removed {name}");
}

/// Reports a failed command on stderr and picks the exit code.
#[allow(clippy::print_stderr)]
pub fn report_failure(err: &anyhow::Error, command_phase: Phase) -> ExitCode {
    let (message, code) = failure_report(err, command_phase);
    tracing::debug!(code, "command failed");
    eprintln!("{message}");
    ExitCode::from(code)
}

/// Renders the failure line and exit code for an error.
///
/// Errors of phase-agnostic kinds inherit the phase of the command that
/// raised them. Commands outside both phases report no phase. Every
/// failure of a build exits with the build code.
fn failure_report(err: &anyhow::Error, command_phase: Phase) -> (String, u8) {
    let Some(known) = err.downcast_ref::<EnvsmithError>() else {
        let code = match command_phase {
            Phase::Build => EXIT_BUILD_FAILURE,
            Phase::Run | Phase::General => EXIT_GENERAL_FAILURE,
        };
        return (format!("{APP_NAME}: error: {err:#}"), code);
    };

    let phase = match (command_phase, known.phase()) {
        (Phase::General, _) => Phase::General,
        (phase, Phase::General) => phase,
        (_, phase) => phase,
    };
    let code = match phase {
        Phase::Build => EXIT_BUILD_FAILURE,
        Phase::Run | Phase::General => known.exit_code(),
    };
    let message = match phase {
        Phase::General => format!("{APP_NAME}: error [{}]: {known}", known.kind()),
        phase => format!(
            "{APP_NAME}: error: {phase} phase failed [{}]: {known}",
            known.kind()
        ),
    };
    (message, code)
}

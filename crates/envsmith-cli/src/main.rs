//! # envsmith CLI
//!
//! Builds named environments from manifests and runs entry points inside
//! them. Logs go to stderr so the child's stdout stays untouched.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::{Cli, LogFormat};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let phase = cli.command.phase();
    match commands::execute(cli) {
        Ok(code) => code,
        Err(err) => output::report_failure(&err, phase),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

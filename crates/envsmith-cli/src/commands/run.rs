//! `envsmith run`: run an entry point inside an environment.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Args};
use envsmith_builder::EnvironmentStore;
use envsmith_common::config::EnvsmithConfig;
use envsmith_common::constants::EXIT_GENERAL_FAILURE;
use envsmith_runtime::{ChildSlot, EntryPoint, Isolation, RunRequest, ScopedExecutor};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["entry", "module"])))]
pub struct RunArgs {
    /// Environment to activate.
    #[arg(long, short)]
    pub environment: String,

    /// Command to run: a path, or a name looked up on the activated PATH.
    #[arg(long)]
    pub entry: Option<String>,

    /// Python module to run with the environment's interpreter.
    #[arg(long)]
    pub module: Option<String>,

    /// Extra variable for the child, applied last (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Run the child without network access.
    #[arg(long)]
    pub isolate_network: bool,

    /// Working directory for the child.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Arguments passed to the entry point (after `--`).
    #[arg(last = true)]
    pub args: Vec<OsString>,
}

impl RunArgs {
    fn entry_point(&self) -> EntryPoint {
        match (&self.entry, &self.module) {
            (_, Some(module)) => EntryPoint::Module(module.clone()),
            (Some(entry), None) => EntryPoint::Command(entry.clone()),
            (None, None) => EntryPoint::Command(String::new()),
        }
    }

    fn into_request(self) -> RunRequest {
        let mut request = RunRequest::new(self.environment.clone(), self.entry_point())
            .args(self.args)
            .isolation(if self.isolate_network {
                Isolation::Network
            } else {
                Isolation::None
            });
        request.overrides = self.env;
        if let Some(cwd) = self.cwd {
            request = request.cwd(cwd);
        }
        request
    }
}

/// Parses a `KEY=VALUE` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{s}\""))?;
    if key.is_empty() {
        return Err(format!("empty variable name in \"{s}\""));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Executes the `run` command and returns the child's exit code.
///
/// # Errors
///
/// Returns an error if the environment is unknown, the entry point cannot
/// be resolved, or the child cannot be spawned.
pub fn execute(args: RunArgs, config: &EnvsmithConfig) -> anyhow::Result<ExitCode> {
    let slot = ChildSlot::new();
    if let Err(e) = slot.install_forwarding() {
        tracing::warn!(error = %e, "termination will not be forwarded to the child");
    }
    let executor = ScopedExecutor::with_slot(EnvironmentStore::open(config.envs_dir()), slot);

    let exit = executor.run(&args.into_request())?;
    Ok(ExitCode::from(
        u8::try_from(exit.code()).unwrap_or(EXIT_GENERAL_FAILURE),
    ))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn parse(argv: &[&str]) -> RunArgs {
        let mut full = vec!["envsmith", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse").command {
            Command::Run(args) => args,
            other => unreachable!("parsed {other:?}"),
        }
    }

    #[test]
    fn trailing_arguments_follow_double_dash() {
        let args = parse(&["--environment", "app", "--entry", "mytool", "--", "--flag", "x"]);
        assert_eq!(args.args, vec![OsString::from("--flag"), OsString::from("x")]);
        assert_eq!(args.entry_point(), EntryPoint::Command("mytool".into()));
    }

    #[test]
    fn module_flag_selects_module_entry() {
        let args = parse(&["-e", "app", "--module", "app.main"]);
        assert_eq!(args.entry_point(), EntryPoint::Module("app.main".into()));
    }

    #[test]
    fn entry_and_module_are_exclusive() {
        let argv = ["envsmith", "run", "-e", "app", "--entry", "a", "--module", "b"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn an_entry_is_required() {
        assert!(Cli::try_parse_from(["envsmith", "run", "-e", "app"]).is_err());
    }

    #[test]
    fn env_overrides_are_collected_in_order() {
        let args = parse(&[
            "-e", "app", "--entry", "t", "--env", "A=1", "--env", "B=x=y",
        ]);
        let request = args.into_request();
        assert_eq!(
            request.overrides,
            vec![("A".into(), "1".into()), ("B".into(), "x=y".into())]
        );
        assert_eq!(request.isolation, Isolation::None);
    }

    #[test]
    fn isolate_network_flag_sets_isolation() {
        let request = parse(&["-e", "app", "--entry", "t", "--isolate-network"]).into_request();
        assert_eq!(request.isolation, Isolation::Network);
    }

    #[test]
    fn key_val_parser_rejects_malformed_pairs() {
        assert!(parse_key_val("NOEQUALS").is_err());
        assert!(parse_key_val("=value").is_err());
        assert_eq!(parse_key_val("K=").expect("empty value"), ("K".into(), String::new()));
    }
}

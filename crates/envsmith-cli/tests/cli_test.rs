//! Integration tests for the `envsmith` binary.
//!
//! Environments are prepared in-process with a fake resolver, then the
//! binary is driven as a subprocess to check exit codes and stream
//! handling.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use envsmith_builder::resolver::{InstalledSet, ResolveError, ResolveRequest, Resolver};
use envsmith_builder::{BuildOptions, EnvironmentBuilder};
use envsmith_common::config::EnvsmithConfig;

struct ScriptResolver;

impl Resolver for ScriptResolver {
    fn name(&self) -> &str {
        "script"
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<InstalledSet, ResolveError> {
        let tool = request.prefix.join("bin").join("mytool");
        std::fs::create_dir_all(tool.parent().expect("bin")).expect("mkdir");
        std::fs::write(
            &tool,
            "#!/bin/sh\necho \"out:$*\"\necho \"err:$APP_MODE\" >&2\nexit \"${CODE:-0}\"\n",
        )
        .expect("write");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        Ok(InstalledSet::default())
    }
}

fn provision(data_dir: &Path) {
    let config = EnvsmithConfig {
        data_dir: data_dir.to_path_buf(),
        ..EnvsmithConfig::default()
    };
    let manifest = envsmith_manifest::parse_manifest(
        "name: app\ndependencies: [foo>=1.0]\nvariables:\n  APP_MODE: cli\n",
    )
    .expect("manifest");
    let _ = EnvironmentBuilder::new(config, ScriptResolver)
        .build(&manifest, BuildOptions::default())
        .expect("build");
}

fn envsmith(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_envsmith"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn envsmith")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn run_forwards_arguments_and_stdio() {
    let dir = tempfile::tempdir().expect("tempdir");
    provision(dir.path());

    let out = envsmith(
        dir.path(),
        &["run", "--environment", "app", "--entry", "mytool", "--", "--flag"],
    );

    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "out:--flag\n");
    assert_eq!(stderr(&out), "err:cli\n");
}

#[test]
fn run_propagates_child_exit_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    provision(dir.path());

    let out = envsmith(
        dir.path(),
        &["run", "-e", "app", "--entry", "mytool", "--env", "CODE=7"],
    );

    assert_eq!(out.status.code(), Some(7));
}

#[test]
fn run_unknown_environment_exits_125() {
    let dir = tempfile::tempdir().expect("tempdir");

    let out = envsmith(dir.path(), &["run", "-e", "ghost", "--entry", "true"]);

    assert_eq!(out.status.code(), Some(125));
    assert!(stderr(&out).contains("run phase failed [EnvironmentNotFound]"));
}

#[test]
fn run_unresolved_entry_exits_127() {
    let dir = tempfile::tempdir().expect("tempdir");
    provision(dir.path());

    let out = envsmith(dir.path(), &["run", "-e", "app", "--entry", "no-such-tool-xyz"]);

    assert_eq!(out.status.code(), Some(127));
    assert!(stderr(&out).contains("[EntryPointUnresolved]"));
}

#[test]
fn build_with_missing_manifest_exits_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manifest = dir.path().join("missing.yml");

    let out = envsmith(
        dir.path(),
        &["build", "--manifest", &manifest.to_string_lossy()],
    );

    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("build phase failed [ManifestInvalid]"));
}

#[test]
fn build_with_malformed_manifest_exits_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manifest = dir.path().join("environment.yml");
    std::fs::write(&manifest, "name: app\ndependencies: {oops\n").expect("write");

    let out = envsmith(
        dir.path(),
        &["build", "--manifest", &manifest.to_string_lossy()],
    );

    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.path().join("envs").join("app").exists());
}

#[test]
fn list_and_inspect_show_provisioned_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    provision(dir.path());

    let listed = envsmith(dir.path(), &["list"]);
    assert_eq!(listed.status.code(), Some(0));
    assert!(stdout(&listed).lines().any(|l| l.starts_with("app ")));

    let inspected = envsmith(dir.path(), &["inspect", "app"]);
    assert_eq!(inspected.status.code(), Some(0));
    let record: serde_json::Value = serde_json::from_slice(&inspected.stdout).expect("json");
    assert_eq!(record["name"], "app");
    assert_eq!(record["resolver"], "script");
}

#[test]
fn remove_deletes_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    provision(dir.path());

    let removed = envsmith(dir.path(), &["remove", "app"]);
    assert_eq!(removed.status.code(), Some(0));
    assert!(!dir.path().join("envs").join("app").exists());

    let again = envsmith(dir.path(), &["remove", "app"]);
    assert_eq!(again.status.code(), Some(125));
}

#[test]
fn sigterm_to_run_terminates_the_child() {
    let dir = tempfile::tempdir().expect("tempdir");
    provision(dir.path());
    let pid_file = dir.path().join("child.pid");
    let script = dir.path().join("sleeper.sh");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
    )
    .expect("write");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut run = Command::new(env!("CARGO_BIN_EXE_envsmith"))
        .arg("--data-dir")
        .arg(dir.path())
        .args(["run", "-e", "app", "--entry"])
        .arg(&script)
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn envsmith");

    let deadline = Instant::now() + Duration::from_secs(10);
    let child_pid = loop {
        if let Some(pid) = std::fs::read_to_string(&pid_file)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
        {
            break pid;
        }
        assert!(Instant::now() < deadline, "child never started");
        std::thread::sleep(Duration::from_millis(20));
    };

    let killed = Command::new("kill")
        .args(["-TERM", &run.id().to_string()])
        .status()
        .expect("kill");
    assert!(killed.success());

    let started = Instant::now();
    let status = run.wait().expect("wait");
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(status.code(), Some(143));
    assert!(!Path::new(&format!("/proc/{child_pid}")).exists());
}

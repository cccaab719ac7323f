//! End-to-end tests for the envsmith runtime.
//!
//! These tests build an environment with a fake resolver and run entry
//! points inside it:
//! 1. Argument and exit status propagation
//! 2. Activation overlay seen by the child
//! 3. Module entry points
//! 4. Run-phase errors that must not spawn anything

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use envsmith_builder::resolver::{
    InstalledPackage, InstalledSet, ResolveError, ResolveRequest, Resolver,
};
use envsmith_builder::{BuildOptions, EnvironmentBuilder, EnvironmentStore};
use envsmith_common::config::EnvsmithConfig;
use envsmith_runtime::{ChildExit, EntryPoint, RunRequest, ScopedExecutor};

const MYTOOL: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$OUT"
printf 'CONDA_PREFIX=%s\nPATH=%s\nAPP_MODE=%s\nPWD=%s\n' \
  "$CONDA_PREFIX" "$PATH" "$APP_MODE" "$(pwd)" > "$OUT.env"
exit "${MYTOOL_EXIT:-0}"
"#;

/// Installs `bin/mytool` and a stand-in `bin/python` into the prefix.
struct ToolResolver;

impl Resolver for ToolResolver {
    fn name(&self) -> &str {
        "tool"
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<InstalledSet, ResolveError> {
        let bin = request.prefix.join("bin");
        std::fs::create_dir_all(&bin).expect("bin");
        for name in ["mytool", "python"] {
            let path = bin.join(name);
            std::fs::write(&path, MYTOOL).expect("script");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
        }
        Ok(InstalledSet::new(
            request
                .primary
                .iter()
                .map(|r| InstalledPackage {
                    name: r.name.clone(),
                    version: "1.0".into(),
                    build: None,
                    channel: None,
                })
                .collect(),
        ))
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    executor: ScopedExecutor,
    prefix: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EnvsmithConfig {
            data_dir: dir.path().join("data"),
            ..EnvsmithConfig::default()
        };
        let manifest = envsmith_manifest::parse_manifest(
            "name: app\ndependencies:\n  - foo>=1.0\nvariables:\n  APP_MODE: test\n",
        )
        .expect("manifest");
        let env = EnvironmentBuilder::new(config.clone(), ToolResolver)
            .build(&manifest, BuildOptions::default())
            .expect("build");
        let executor = ScopedExecutor::new(EnvironmentStore::open(config.envs_dir()));
        Self {
            prefix: env.root,
            dir,
            executor,
        }
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn request(&self, entry: EntryPoint) -> RunRequest {
        RunRequest::new("app", entry).env("OUT", self.out().to_string_lossy())
    }

    fn read(&self, suffix: &str) -> String {
        let mut path = self.out().into_os_string();
        path.push(suffix);
        std::fs::read_to_string(path).expect("child output")
    }
}

fn command(name: &str) -> EntryPoint {
    EntryPoint::Command(name.into())
}

// ── Propagation ──────────────────────────────────────────────────────

#[test]
fn e2e_mytool_receives_flag_and_exits_zero() {
    let fx = Fixture::new();
    let exit = fx
        .executor
        .run(&fx.request(command("mytool")).args(["--flag"]))
        .expect("run");

    assert_eq!(exit, ChildExit::Code(0));
    assert_eq!(fx.read(""), "--flag\n");
}

#[test]
fn e2e_exit_code_seven_is_propagated() {
    let fx = Fixture::new();
    let exit = fx
        .executor
        .run(&fx.request(command("mytool")).env("MYTOOL_EXIT", "7"))
        .expect("run");

    assert_eq!(exit.code(), 7);
}

#[test]
fn e2e_arguments_pass_through_verbatim() {
    let fx = Fixture::new();
    let _ = fx
        .executor
        .run(&fx.request(command("mytool")).args(["a b", "--", "$HOME", ""]))
        .expect("run");

    assert_eq!(fx.read(""), "a b\n--\n$HOME\n\n");
}

#[test]
fn e2e_signal_death_is_not_swallowed() {
    let fx = Fixture::new();
    let script = fx.dir.path().join("suicide.sh");
    std::fs::write(&script, "#!/bin/sh\nkill -KILL $$\n").expect("write");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let exit = fx
        .executor
        .run(&fx.request(command(&script.to_string_lossy())))
        .expect("run");

    assert_eq!(exit, ChildExit::Signal(9));
    assert_eq!(exit.code(), 137);
}

// ── Activation ───────────────────────────────────────────────────────

#[test]
fn e2e_child_sees_activation_overlay() {
    let fx = Fixture::new();
    let _ = fx
        .executor
        .run(&fx.request(command("mytool")))
        .expect("run");

    let env = fx.read(".env");
    let bin = fx.prefix.join("bin");
    assert!(env.contains(&format!("CONDA_PREFIX={}\n", fx.prefix.display())));
    assert!(env.contains(&format!("PATH={}", bin.display())));
    assert!(env.contains("APP_MODE=test\n"));
}

#[test]
fn e2e_overrides_win_over_manifest_variables() {
    let fx = Fixture::new();
    let _ = fx
        .executor
        .run(&fx.request(command("mytool")).env("APP_MODE", "override"))
        .expect("run");

    assert!(fx.read(".env").contains("APP_MODE=override\n"));
}

#[test]
fn e2e_working_directory_is_respected() {
    let fx = Fixture::new();
    let work = fx.dir.path().join("work");
    std::fs::create_dir_all(&work).expect("mkdir");
    let _ = fx
        .executor
        .run(&fx.request(command("mytool")).cwd(&work))
        .expect("run");

    let canonical = work.canonicalize().expect("canonical");
    assert!(fx.read(".env").contains(&format!("PWD={}\n", canonical.display())));
}

#[test]
fn e2e_runs_leave_no_global_state() {
    let fx = Fixture::new();
    let before = std::env::var_os("CONDA_PREFIX");
    for _ in 0..2 {
        let _ = fx
            .executor
            .run(&fx.request(command("mytool")))
            .expect("run");
    }
    assert_eq!(std::env::var_os("CONDA_PREFIX"), before);
}

#[test]
fn e2e_relative_data_dir_runs_from_another_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let data = tempfile::tempdir_in(&cwd).expect("tempdir");
    let relative = data.path().strip_prefix(&cwd).expect("relative").to_path_buf();
    let config = EnvsmithConfig {
        data_dir: relative,
        ..EnvsmithConfig::default()
    };
    let manifest =
        envsmith_manifest::parse_manifest("name: app\ndependencies: [foo]\n").expect("manifest");
    let env = EnvironmentBuilder::new(config.clone(), ToolResolver)
        .build(&manifest, BuildOptions::default())
        .expect("build");
    assert!(env.activation().prefix.is_absolute());
    assert!(env.activation().path_dirs.iter().all(|d| d.is_absolute()));

    let elsewhere = tempfile::tempdir().expect("elsewhere");
    let out = elsewhere.path().join("out");
    let executor = ScopedExecutor::new(EnvironmentStore::open(config.envs_dir()));
    let exit = executor
        .run(
            &RunRequest::new("app", command("mytool"))
                .env("OUT", out.to_string_lossy())
                .cwd(elsewhere.path()),
        )
        .expect("run");

    assert_eq!(exit, ChildExit::Code(0));
    let prefix = data.path().join("envs").join("app");
    let dump = std::fs::read_to_string(elsewhere.path().join("out.env")).expect("env dump");
    assert!(dump.contains(&format!("CONDA_PREFIX={}\n", prefix.display())));
}

// ── Modules ──────────────────────────────────────────────────────────

#[test]
fn e2e_module_runs_with_environment_python() {
    let fx = Fixture::new();
    let _ = fx
        .executor
        .run(
            &fx.request(EntryPoint::Module("app.main".into()))
                .args(["--port", "8080"]),
        )
        .expect("run");

    assert_eq!(fx.read(""), "-m\napp.main\n--port\n8080\n");
}

// ── Run-phase errors ─────────────────────────────────────────────────

#[test]
fn e2e_unknown_environment_spawns_nothing() {
    let fx = Fixture::new();
    let marker = fx.dir.path().join("spawned");
    let script = fx.dir.path().join("touch.sh");
    std::fs::write(&script, format!("#!/bin/sh\ntouch {}\n", marker.display())).expect("write");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let err = fx
        .executor
        .run(&RunRequest::new("ghost", command(&script.to_string_lossy())))
        .unwrap_err();

    assert_eq!(err.kind(), "EnvironmentNotFound");
    assert_eq!(err.exit_code(), 125);
    assert!(!marker.exists());
}

#[test]
fn e2e_missing_entry_point_is_unresolved() {
    let fx = Fixture::new();
    let err = fx
        .executor
        .run(&fx.request(command("no-such-tool-anywhere")))
        .unwrap_err();

    assert_eq!(err.kind(), "EntryPointUnresolved");
    assert_eq!(err.exit_code(), 127);
}

#[test]
fn e2e_run_does_not_modify_environment() {
    let fx = Fixture::new();
    let record = fx.prefix.join("environment.json");
    let before = std::fs::read(&record).expect("record");
    let _ = fx
        .executor
        .run(&fx.request(command("mytool")))
        .expect("run");
    assert_eq!(std::fs::read(Path::new(&record)).expect("record"), before);
}

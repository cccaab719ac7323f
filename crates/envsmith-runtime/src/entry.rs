//! Entry point resolution against an activation context.

use std::ffi::OsString;
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use envsmith_common::error::{EnvsmithError, Result};

use crate::activation::ActivationContext;

/// What the caller asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// An executable: a path containing `/`, or a bare name looked up on
    /// the activation `PATH`.
    Command(String),
    /// A dotted Python module run with the environment's interpreter.
    Module(String),
}

/// A resolved program plus the arguments that precede the caller's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// Absolute path of the program to exec.
    pub program: PathBuf,
    /// Arguments inserted before the caller's own.
    pub leading_args: Vec<OsString>,
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(cmd) => f.write_str(cmd),
            Self::Module(module) => write!(f, "-m {module}"),
        }
    }
}

impl EntryPoint {
    /// Resolves the entry point inside `context`.
    ///
    /// `prefix` is the environment's installation prefix and `cwd` the
    /// directory relative paths are resolved against.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::EntryPointUnresolved` if the program does
    /// not exist, is not an executable file, or (for modules) the
    /// interpreter found is not the environment's own.
    pub fn resolve(
        &self,
        context: &ActivationContext,
        prefix: &Path,
        cwd: &Path,
    ) -> Result<ResolvedEntry> {
        let resolved = match self {
            Self::Command(cmd) if cmd.is_empty() => Err(self.unresolved("empty command")),
            Self::Command(cmd) if cmd.contains('/') => {
                let program = cwd.join(cmd);
                ensure_executable(&program).map_err(|m| self.unresolved(m))?;
                Ok(ResolvedEntry {
                    program,
                    leading_args: Vec::new(),
                })
            }
            Self::Command(cmd) => {
                let program = which::which_in(cmd, context.search_path(), cwd)
                    .map_err(|_| self.unresolved("not found on the activation PATH"))?;
                Ok(ResolvedEntry {
                    program,
                    leading_args: Vec::new(),
                })
            }
            Self::Module(module) => {
                if !is_dotted_identifier(module) {
                    return Err(self.unresolved("not a dotted module name"));
                }
                let python = which::which_in("python", context.search_path(), cwd)
                    .map_err(|_| self.unresolved("no python interpreter on the activation PATH"))?;
                if !python.starts_with(prefix) {
                    return Err(self.unresolved(format!(
                        "python resolves to {} outside the environment",
                        python.display()
                    )));
                }
                Ok(ResolvedEntry {
                    program: python,
                    leading_args: vec!["-m".into(), module.into()],
                })
            }
        };
        if let Ok(entry) = &resolved {
            tracing::debug!(entry = %self, program = %entry.program.display(), "entry point resolved");
        }
        resolved
    }

    fn unresolved(&self, message: impl Into<String>) -> EnvsmithError {
        EnvsmithError::EntryPointUnresolved {
            entry: self.to_string(),
            message: message.into(),
        }
    }
}

fn ensure_executable(path: &Path) -> std::result::Result<(), String> {
    let meta = std::fs::metadata(path).map_err(|e| format!("{}: {e}", path.display()))?;
    if !meta.is_file() {
        return Err(format!("{} is not a regular file", path.display()));
    }
    if meta.permissions().mode() & 0o111 == 0 {
        return Err(format!("{} is not executable", path.display()));
    }
    Ok(())
}

fn is_dotted_identifier(module: &str) -> bool {
    !module.is_empty()
        && module.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use envsmith_builder::ActivationDescriptor;

    use super::*;

    fn write_script(path: &Path, mode: u32) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "#!/bin/sh\nexit 0\n").expect("write");
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).expect("chmod");
    }

    fn context(prefix: &Path, inherited_path: &str) -> ActivationContext {
        let desc = ActivationDescriptor {
            prefix: prefix.to_path_buf(),
            path_dirs: vec![prefix.join("bin")],
            variables: BTreeMap::new(),
        };
        ActivationContext::overlay(&desc, [("PATH".into(), inherited_path.into())])
            .expect("context")
    }

    #[test]
    fn bare_name_prefers_environment_bin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefix = dir.path().join("env");
        let host = dir.path().join("host");
        write_script(&prefix.join("bin/mytool"), 0o755);
        write_script(&host.join("mytool"), 0o755);

        let ctx = context(&prefix, &host.to_string_lossy());
        let entry = EntryPoint::Command("mytool".into())
            .resolve(&ctx, &prefix, dir.path())
            .expect("resolve");
        assert_eq!(entry.program, prefix.join("bin/mytool"));
        assert!(entry.leading_args.is_empty());
    }

    #[test]
    fn bare_name_falls_back_to_inherited_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefix = dir.path().join("env");
        let host = dir.path().join("host");
        write_script(&host.join("helper"), 0o755);

        let ctx = context(&prefix, &host.to_string_lossy());
        let entry = EntryPoint::Command("helper".into())
            .resolve(&ctx, &prefix, dir.path())
            .expect("resolve");
        assert_eq!(entry.program, host.join("helper"));
    }

    #[test]
    fn unknown_command_is_unresolved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(dir.path(), "");
        let err = EntryPoint::Command("definitely-not-here".into())
            .resolve(&ctx, dir.path(), dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "EntryPointUnresolved");
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn relative_path_resolves_against_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_script(&dir.path().join("scripts/run.sh"), 0o755);
        let ctx = context(dir.path(), "");
        let entry = EntryPoint::Command("scripts/run.sh".into())
            .resolve(&ctx, dir.path(), dir.path())
            .expect("resolve");
        assert_eq!(entry.program, dir.path().join("scripts/run.sh"));
    }

    #[test]
    fn non_executable_path_is_unresolved() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_script(&dir.path().join("data.txt"), 0o644);
        let ctx = context(dir.path(), "");
        let err = EntryPoint::Command("./data.txt".into())
            .resolve(&ctx, dir.path(), dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }

    #[test]
    fn directory_path_is_unresolved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(dir.path(), "");
        let err = EntryPoint::Command(format!("{}/", dir.path().display()))
            .resolve(&ctx, dir.path(), dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "EntryPointUnresolved");
    }

    #[test]
    fn module_uses_environment_python() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefix = dir.path().join("env");
        write_script(&prefix.join("bin/python"), 0o755);
        let ctx = context(&prefix, "");
        let entry = EntryPoint::Module("app.main".into())
            .resolve(&ctx, &prefix, dir.path())
            .expect("resolve");
        assert_eq!(entry.program, prefix.join("bin/python"));
        assert_eq!(entry.leading_args, vec![OsString::from("-m"), OsString::from("app.main")]);
    }

    #[test]
    fn module_rejects_host_python() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefix = dir.path().join("env");
        let host = dir.path().join("host");
        write_script(&host.join("python"), 0o755);
        let ctx = context(&prefix, &host.to_string_lossy());
        let err = EntryPoint::Module("app".into())
            .resolve(&ctx, &prefix, dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("outside the environment"));
    }

    #[test]
    fn module_name_must_be_dotted_identifier() {
        assert!(is_dotted_identifier("pkg.sub_mod"));
        assert!(is_dotted_identifier("_private"));
        assert!(!is_dotted_identifier("pkg..sub"));
        assert!(!is_dotted_identifier("1pkg"));
        assert!(!is_dotted_identifier("pkg/sub"));
        assert!(!is_dotted_identifier(""));
    }
}

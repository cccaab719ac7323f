//! Optional restrictions applied to the child before exec.
//!
//! With [`Isolation::Network`] the child gets fresh user and network
//! namespaces. Its new network namespace only holds a loopback interface
//! that is down, so it cannot reach the host network. The user namespace
//! maps the caller's own uid and gid, so file ownership looks unchanged.

use std::process::Command;

use envsmith_common::error::Result;

/// Isolation level for an entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Isolation {
    /// Share everything with the caller.
    #[default]
    None,
    /// Cut the child off from the network.
    Network,
}

impl Isolation {
    /// Installs the pre-exec hooks this level needs on `command`.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::Config` if the level is unsupported on this
    /// platform.
    pub fn configure(self, command: &mut Command) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Network => network::configure(command),
        }
    }
}

#[cfg(target_os = "linux")]
mod network {
    use std::ffi::CStr;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    use envsmith_common::error::Result;
    use nix::fcntl::{OFlag, open};
    use nix::sched::{CloneFlags, unshare};
    use nix::sys::stat::Mode;
    use nix::unistd::{getgid, getuid, write};

    pub(super) fn configure(command: &mut Command) -> Result<()> {
        let uid_map = format!("{uid} {uid} 1\n", uid = getuid()).into_bytes();
        let gid_map = format!("{gid} {gid} 1\n", gid = getgid()).into_bytes();
        tracing::debug!("child will run in private user and network namespaces");

        // SAFETY: the hook only issues raw syscalls on buffers prepared
        // before fork. It allocates nothing and takes no locks.
        unsafe {
            let _ = command.pre_exec(move || enter(&uid_map, &gid_map));
        }
        Ok(())
    }

    fn enter(uid_map: &[u8], gid_map: &[u8]) -> std::io::Result<()> {
        unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET)?;
        write_proc(c"/proc/self/setgroups", b"deny")?;
        write_proc(c"/proc/self/uid_map", uid_map)?;
        write_proc(c"/proc/self/gid_map", gid_map)?;
        Ok(())
    }

    fn write_proc(path: &CStr, data: &[u8]) -> std::io::Result<()> {
        let fd = open(path, OFlag::O_WRONLY | OFlag::O_CLOEXEC, Mode::empty())?;
        let _ = write(&fd, data)?;
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod network {
    use std::process::Command;

    use envsmith_common::error::{EnvsmithError, Result};

    pub(super) fn configure(_command: &mut Command) -> Result<()> {
        Err(EnvsmithError::Config {
            message: "network isolation requires Linux namespaces".into(),
        })
    }
}

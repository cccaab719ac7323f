//! Child process supervision.
//!
//! Exactly one child runs per invocation. The parent blocks in `wait` and
//! never abandons it: termination signals received meanwhile are forwarded
//! to the child as `SIGTERM`, and on Linux the child also receives
//! `SIGTERM` if the parent dies outright.

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use envsmith_common::constants::{EXIT_GENERAL_FAILURE, SIGNAL_EXIT_BASE};
use envsmith_common::error::{EnvsmithError, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited normally with this code.
    Code(i32),
    /// Killed by this signal number.
    Signal(i32),
}

impl ChildExit {
    /// Maps an OS exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Code(code),
            (None, Some(signal)) => Self::Signal(signal),
            (None, None) => Self::Code(i32::from(EXIT_GENERAL_FAILURE)),
        }
    }

    /// Exit code to report as our own: the child's code, or
    /// `128 + signal` when it was killed.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Code(code) => code,
            Self::Signal(signal) => SIGNAL_EXIT_BASE + signal,
        }
    }

    /// Returns `true` for a zero exit code.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Code(0))
    }
}

/// Pid of the running child, shared with the signal handler.
///
/// A termination request that arrives while no child is running stays
/// pending: no child is spawned afterwards, and one spawned concurrently
/// is terminated as soon as it is registered.
#[derive(Debug, Clone, Default)]
pub struct ChildSlot(Arc<SlotState>);

#[derive(Debug, Default)]
struct SlotState {
    /// Zero means no child is running.
    pid: AtomicI32,
    terminating: AtomicBool,
}

impl ChildSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the process-wide handler forwarding SIGINT, SIGTERM and
    /// SIGHUP to whatever child occupies this slot.
    ///
    /// Can only succeed once per process.
    ///
    /// # Errors
    ///
    /// Returns `EnvsmithError::Config` if a handler is already installed.
    pub fn install_forwarding(&self) -> Result<()> {
        let slot = self.clone();
        ctrlc::set_handler(move || {
            if slot.terminate() {
                tracing::info!("forwarded termination to child");
            }
        })
        .map_err(|e| EnvsmithError::Config {
            message: format!("cannot install signal handler: {e}"),
        })
    }

    /// Records a termination request and forwards `SIGTERM` to the
    /// current child. Returns `true` if a child received it.
    pub fn terminate(&self) -> bool {
        self.0.terminating.store(true, Ordering::SeqCst);
        self.forward(Signal::SIGTERM)
    }

    /// Returns `true` once termination has been requested.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.0.terminating.load(Ordering::SeqCst)
    }

    /// Sends `signal` to the current child. Returns `false` when no child
    /// is running or delivery failed.
    pub fn forward(&self, signal: Signal) -> bool {
        match self.0.pid.load(Ordering::SeqCst) {
            0 => false,
            pid => kill(Pid::from_raw(pid), signal).is_ok(),
        }
    }

    /// Returns the pid of the running child, if any.
    #[must_use]
    pub fn current(&self) -> Option<i32> {
        match self.0.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn occupy(&self, pid: u32) {
        self.0.pid.store(i32::try_from(pid).unwrap_or(0), Ordering::SeqCst);
    }

    fn vacate(&self) {
        self.0.pid.store(0, Ordering::SeqCst);
    }
}

/// Spawns `command` and blocks until it terminates.
///
/// Stdio is inherited unchanged. The child is registered in `slot` for
/// the duration of the wait. If termination was already requested nothing
/// is spawned and the result is a `SIGTERM` death.
///
/// # Errors
///
/// Returns `EnvsmithError::SpawnError` if the OS refuses to start the
/// program, and `EnvsmithError::Io` if waiting fails.
pub fn spawn_and_wait(mut command: Command, program: &Path, slot: &ChildSlot) -> Result<ChildExit> {
    if slot.is_terminating() {
        tracing::info!(program = %program.display(), "termination requested, not spawning");
        return Ok(ChildExit::Signal(Signal::SIGTERM as i32));
    }
    die_with_parent(&mut command);

    let mut child = command.spawn().map_err(|source| EnvsmithError::SpawnError {
        program: program.to_path_buf(),
        source,
    })?;
    slot.occupy(child.id());
    tracing::debug!(pid = child.id(), program = %program.display(), "child started");
    // A request that raced with spawn saw no pid.
    if slot.is_terminating() {
        let _ = slot.forward(Signal::SIGTERM);
    }

    let status = child.wait();
    slot.vacate();
    let status = status.map_err(|e| EnvsmithError::io(program, e))?;

    let exit = ChildExit::from_status(status);
    if let ChildExit::Signal(signal) = exit {
        tracing::warn!(signal, code = exit.code(), "child killed by signal");
    }
    Ok(exit)
}

#[cfg(target_os = "linux")]
fn die_with_parent(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    let parent = nix::unistd::getpid();
    // SAFETY: prctl and getppid are async-signal-safe syscalls.
    unsafe {
        let _ = command.pre_exec(move || {
            nix::sys::prctl::set_pdeathsig(Signal::SIGTERM)?;
            if nix::unistd::getppid() != parent {
                return Err(nix::errno::Errno::ESRCH.into());
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
const fn die_with_parent(_command: &mut Command) {}

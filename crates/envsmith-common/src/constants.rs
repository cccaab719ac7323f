//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for envsmith data when no home directory is known.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/envsmith";

/// Returns the data directory, preferring `$HOME/.envsmith` and falling
/// back to `/var/lib/envsmith`.
fn resolve_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".envsmith"),
        _ => PathBuf::from(SYSTEM_DATA_DIR),
    }
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved default data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Subdirectory of the data dir holding one directory per environment.
pub const ENVS_DIR: &str = "envs";

/// Subdirectory of the data dir holding per-build transient caches.
pub const CACHE_DIR: &str = "cache";

/// Environment record written inside every materialized environment.
pub const RECORD_FILE: &str = "environment.json";

/// Advisory lock file serializing builds.
pub const LOCK_FILE: &str = "build.lock";

/// Optional configuration file inside the data dir.
pub const CONFIG_FILE: &str = "config.json";

/// Name prefix of replaced environments awaiting deletion.
pub const RETIRED_PREFIX: &str = ".retired-";

/// Maximum length of an environment name.
pub const MAX_ENV_NAME_LEN: usize = 64;

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Exit code for any build-phase failure.
pub const EXIT_BUILD_FAILURE: u8 = 2;

/// Exit code for failures outside a specific phase.
pub const EXIT_GENERAL_FAILURE: u8 = 1;

/// Exit code when the requested environment does not exist.
pub const EXIT_ENV_NOT_FOUND: u8 = 125;

/// Exit code when the entry point exists but could not be started.
pub const EXIT_SPAWN_FAILED: u8 = 126;

/// Exit code when the entry point cannot be found in the activation context.
pub const EXIT_ENTRY_UNRESOLVED: u8 = 127;

/// Offset added to a signal number when a child is killed by that signal.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Application name used in CLI output and records.
pub const APP_NAME: &str = "envsmith";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "envsmith";

//! Path resolution for pvesetup
//!
//! # Environment Variables
//!
//! - `PVESETUP_CONFIG` - Host description file (read by the CLI)
//! - `PVESETUP_STATE_DIR` - Override state directory (run log)
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `PVESETUP_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/pvesetup` (if set)
//! 3. Platform state directory (`~/.local/state/pvesetup`)
//! 4. `/var/log/pvesetup` (root without a home directory)

use std::path::PathBuf;

/// Environment variable for the host description file
pub const ENV_CONFIG: &str = "PVESETUP_CONFIG";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "PVESETUP_STATE_DIR";

const APP_DIR: &str = "pvesetup";

/// Get the pvesetup state directory path
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return path;
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return path;
    }

    if let Some(dir) = dirs::state_dir() {
        let path = dir.join(APP_DIR);
        log::debug!("Using default state dir: {}", path.display());
        return path;
    }

    let path = PathBuf::from("/var/log").join(APP_DIR);
    log::debug!("Using fallback state dir: {}", path.display());
    path
}

/// Path of the append-only run log
pub fn run_log() -> PathBuf {
    state_dir().join("runs.jsonl")
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

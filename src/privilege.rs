//! Root privilege check for commands that change the host

use anyhow::{Result, bail};

/// Whether the effective user is root
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe {
        libc::geteuid() == 0
    }
}

/// Fail unless running as root
pub fn require_root(command: &str) -> Result<()> {
    if !is_root() {
        bail!("{command} changes the host and must run as root (try: sudo pvesetup {command})");
    }
    Ok(())
}

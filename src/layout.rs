//! Filesystem layout of a Proxmox VE host
//!
//! Every file the provisioner reads or writes is resolved through a
//! [`PveLayout`], so tests (and `--root`) can point it at a scratch tree.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PveLayout {
    root: PathBuf,
}

impl Default for PveLayout {
    fn default() -> Self {
        Self::new("/")
    }
}

impl PveLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an absolute host path under the layout root
    pub fn resolve(&self, host_path: &str) -> PathBuf {
        self.root.join(host_path.trim_start_matches('/'))
    }

    pub fn os_release(&self) -> PathBuf {
        self.resolve("/etc/os-release")
    }

    pub fn apt_source(&self, file_name: &str) -> PathBuf {
        self.resolve(&format!("/etc/apt/sources.list.d/{file_name}"))
    }

    pub fn network_stanza(&self, interface: &str) -> PathBuf {
        self.resolve(&format!("/etc/network/interfaces.d/{interface}"))
    }

    pub fn cluster_firewall(&self) -> PathBuf {
        self.resolve("/etc/pve/firewall/cluster.fw")
    }

    pub fn host_firewall(&self, node: &str) -> PathBuf {
        self.resolve(&format!("/etc/pve/nodes/{node}/host.fw"))
    }

    pub fn guest_firewall(&self, vmid: u32) -> PathBuf {
        self.resolve(&format!("/etc/pve/firewall/{vmid}.fw"))
    }
}

//! Rendering of every file the provisioner manages
//!
//! Contents are a pure function of the host description (plus the detected
//! Debian codename), so a file whose bytes already match is left alone.

use crate::error::ProvisionError;
use crate::firewall;
use crate::layout::PveLayout;
use crate::schema::{HostSpec, NetworkConfig, RepositoryConfig};
use std::fmt::Write;
use std::path::PathBuf;

const HEADER: &str = "# Managed by pvesetup\n";
const NO_SUBSCRIPTION_URI: &str = "http://download.proxmox.com/debian/pve";
const ENTERPRISE_URI: &str = "https://enterprise.proxmox.com/debian/pve";
const KEYRING: &str = "/usr/share/keyrings/proxmox-archive-keyring.gpg";
const IFRELOAD_ARGS: &[&str] = &["-a"];

/// What a managed file configures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    AptSource,
    Network,
    Firewall,
}

impl FileKind {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::AptSource => "apt_source",
            Self::Network => "network",
            Self::Firewall => "firewall_file",
        }
    }

    /// Command that makes the host pick up a rewritten file
    pub fn reload_command(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Network => Some(("ifreload", IFRELOAD_ARGS)),
            Self::AptSource | Self::Firewall => None,
        }
    }
}

/// A file with its desired content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub kind: FileKind,
    /// Location on disk, under the layout root
    pub path: PathBuf,
    pub content: String,
}

/// apt source syntax understood by a Debian release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AptFormat {
    /// One-line `.list` files
    Legacy,
    /// deb822 `.sources` stanzas
    Deb822,
}

impl AptFormat {
    pub fn for_codename(codename: &str) -> Self {
        match codename {
            "buster" | "bullseye" | "bookworm" => Self::Legacy,
            _ => Self::Deb822,
        }
    }
}

/// Render every managed file the host description asks for
///
/// `codename` is the detected Debian release; it is only needed when
/// repositories are managed and no override is configured.
pub fn managed_files(
    spec: &HostSpec,
    layout: &PveLayout,
    codename: Option<&str>,
) -> Result<Vec<RenderedFile>, ProvisionError> {
    let mut files = Vec::new();

    if let Some(repos) = &spec.repositories {
        let codename = repos.codename.as_deref().or(codename).ok_or_else(|| {
            declarative::Error::PreconditionUnmet {
                action: "apt_source".to_string(),
                message: "could not detect the Debian codename; set repositories.codename"
                    .to_string(),
            }
        })?;
        for (name, content) in apt_sources(repos, codename) {
            files.push(RenderedFile {
                kind: FileKind::AptSource,
                path: layout.apt_source(&name),
                content,
            });
        }
    }

    if let Some(network) = &spec.network {
        files.push(RenderedFile {
            kind: FileKind::Network,
            path: layout.network_stanza(&network.name),
            content: network_stanza(network, spec.host.domain.as_deref()),
        });
    }

    if let Some(policy) = &spec.firewall {
        files.push(RenderedFile {
            kind: FileKind::Firewall,
            path: layout.cluster_firewall(),
            content: pvefw::write_string(&firewall::cluster_file(policy)),
        });
        if let Some(host) = &policy.host {
            files.push(RenderedFile {
                kind: FileKind::Firewall,
                path: layout.host_firewall(spec.host.node_name()),
                content: pvefw::write_string(&firewall::host_file(host)),
            });
        }
        for guest in &policy.guests {
            files.push(RenderedFile {
                kind: FileKind::Firewall,
                path: layout.guest_firewall(guest.vmid),
                content: pvefw::write_string(&firewall::guest_file(guest)),
            });
        }
    }

    Ok(files)
}

/// apt source files as `(file name, content)` pairs
pub fn apt_sources(repos: &RepositoryConfig, codename: &str) -> Vec<(String, String)> {
    let format = AptFormat::for_codename(codename);
    let mut files = Vec::new();

    if repos.no_subscription {
        let (name, content) = match format {
            AptFormat::Legacy => (
                "pve-no-subscription.list",
                format!("{HEADER}deb {NO_SUBSCRIPTION_URI} {codename} pve-no-subscription\n"),
            ),
            AptFormat::Deb822 => (
                "proxmox.sources",
                deb822_stanza(NO_SUBSCRIPTION_URI, codename, "pve-no-subscription", true),
            ),
        };
        files.push((name.to_string(), content));
    }

    if repos.disable_enterprise {
        let (name, content) = match format {
            AptFormat::Legacy => (
                "pve-enterprise.list",
                format!("{HEADER}# deb {ENTERPRISE_URI} {codename} pve-enterprise\n"),
            ),
            AptFormat::Deb822 => (
                "pve-enterprise.sources",
                deb822_stanza(ENTERPRISE_URI, codename, "pve-enterprise", false),
            ),
        };
        files.push((name.to_string(), content));
    }

    files
}

fn deb822_stanza(uri: &str, suite: &str, component: &str, enabled: bool) -> String {
    let mut out = String::from(HEADER);
    let _ = writeln!(out, "Types: deb");
    let _ = writeln!(out, "URIs: {uri}");
    let _ = writeln!(out, "Suites: {suite}");
    let _ = writeln!(out, "Components: {component}");
    let _ = writeln!(out, "Signed-By: {KEYRING}");
    if !enabled {
        let _ = writeln!(out, "Enabled: false");
    }
    out
}

/// ifupdown2 stanza for the bridge interface
pub fn network_stanza(network: &NetworkConfig, domain: Option<&str>) -> String {
    let family = if network.address.contains(':') {
        "inet6"
    } else {
        "inet"
    };
    let ports = if network.bridge_ports.is_empty() {
        "none".to_string()
    } else {
        network.bridge_ports.join(" ")
    };

    let mut out = String::from(HEADER);
    let _ = writeln!(out, "auto {}", network.name);
    let _ = writeln!(out, "iface {} {family} static", network.name);
    let _ = writeln!(out, "\taddress {}", network.address);
    if let Some(gateway) = &network.gateway {
        let _ = writeln!(out, "\tgateway {gateway}");
    }
    let _ = writeln!(out, "\tbridge-ports {ports}");
    let _ = writeln!(out, "\tbridge-stp off");
    let _ = writeln!(out, "\tbridge-fd 0");
    if let Some(domain) = domain {
        let _ = writeln!(out, "\tdns-search {domain}");
    }
    if let Some(comment) = &network.comment {
        let _ = writeln!(out, "#{comment}");
    }
    out
}

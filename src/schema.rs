//! Host description schema
//!
//! One TOML file describes the desired state of a single Proxmox VE host.
//! Everything here is immutable once loaded; [`HostSpec::validate`] runs
//! every check that can be made without touching the host.

use crate::error::ConfigError;
use declarative::FailurePolicy;
use pvefw::{Direction, LogLevel, Verdict};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("hostname pattern")
});
static TIMEZONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_+-]*(/[A-Za-z0-9_+-]+)*$").expect("timezone pattern")
});
static SCHEDULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("schedule pattern"));
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").expect("identifier pattern"));
static SHA256_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("sha256 pattern"));

// ============================================================================
// Main Schema
// ============================================================================

/// Desired state of one Proxmox VE host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSpec {
    pub host: HostConfig,

    /// Bridge interface stanza
    #[serde(default)]
    pub network: Option<NetworkConfig>,

    /// Proxmox apt repositories
    #[serde(default)]
    pub repositories: Option<RepositoryConfig>,

    /// ZFS pools and the storage entries backed by them
    #[serde(default)]
    pub pools: Vec<DiskPool>,

    /// Scheduled vzdump job
    #[serde(default)]
    pub backup: Option<BackupPolicy>,

    #[serde(default)]
    pub firewall: Option<FirewallPolicy>,

    /// Container templates and ISO images to fetch
    #[serde(default)]
    pub templates: Vec<TemplateRequest>,

    /// VM templates built from an ISO
    #[serde(default)]
    pub vm_templates: Vec<VmTemplate>,

    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub hostname: String,

    /// DNS search domain written into the bridge stanza
    #[serde(default)]
    pub domain: Option<String>,

    pub timezone: String,

    /// Proxmox node name, defaults to the hostname
    #[serde(default)]
    pub node: Option<String>,
}

impl HostConfig {
    /// Node name used under `/etc/pve/nodes/`
    pub fn node_name(&self) -> &str {
        self.node.as_deref().unwrap_or(&self.hostname)
    }
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_bridge")]
    pub name: String,
    /// Address in CIDR notation
    pub address: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub bridge_ports: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_bridge() -> String {
    "vmbr0".to_string()
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Add the pve-no-subscription source
    #[serde(default = "default_true")]
    pub no_subscription: bool,
    /// Disable the pve-enterprise source
    #[serde(default = "default_true")]
    pub disable_enterprise: bool,
    /// Debian codename, detected from `/etc/os-release` when unset
    #[serde(default)]
    pub codename: Option<String>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Pools
// ============================================================================

/// Redundancy scheme of a ZFS pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidLevel {
    Stripe,
    Mirror,
    Raid10,
    Raidz1,
    Raidz2,
    Raidz3,
}

impl RaidLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Mirror => "mirror",
            Self::Raid10 => "raid10",
            Self::Raidz1 => "raidz1",
            Self::Raidz2 => "raidz2",
            Self::Raidz3 => "raidz3",
        }
    }

    /// Smallest number of devices the layout accepts
    pub fn min_devices(&self) -> usize {
        match self {
            Self::Stripe => 1,
            Self::Mirror => 2,
            Self::Raid10 => 4,
            Self::Raidz1 => 3,
            Self::Raidz2 => 4,
            Self::Raidz3 => 5,
        }
    }

    /// Check a device count against the layout, describing the problem
    pub fn check_device_count(&self, count: usize) -> Result<(), String> {
        let min = self.min_devices();
        if count < min {
            return Err(format!("needs at least {min} devices, got {count}"));
        }
        if *self == Self::Raid10 && count % 2 != 0 {
            return Err(format!("needs an even number of devices, got {count}"));
        }
        Ok(())
    }

    /// Vdev arguments for `zpool create`
    pub fn vdev_args(&self, devices: &[String]) -> Vec<String> {
        match self {
            Self::Stripe => devices.to_vec(),
            Self::Mirror => std::iter::once("mirror".to_string())
                .chain(devices.iter().cloned())
                .collect(),
            Self::Raid10 => devices
                .chunks(2)
                .flat_map(|pair| std::iter::once("mirror".to_string()).chain(pair.iter().cloned()))
                .collect(),
            Self::Raidz1 | Self::Raidz2 | Self::Raidz3 => std::iter::once(self.as_str().to_string())
                .chain(devices.iter().cloned())
                .collect(),
        }
    }
}

impl fmt::Display for RaidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a pool's storage entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolPurpose {
    /// Guest disks (`zfspool` storage)
    Vm,
    /// vzdump archives (`dir` storage)
    Backup,
    /// ISO images and container templates (`dir` storage)
    Iso,
}

impl PoolPurpose {
    /// Proxmox content types the storage entry is registered with
    pub fn content(&self) -> &'static [&'static str] {
        match self {
            Self::Vm => &["images", "rootdir"],
            Self::Backup => &["backup"],
            Self::Iso => &["iso", "vztmpl"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Backup => "backup",
            Self::Iso => "iso",
        }
    }
}

/// ZFS `compression` property
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZfsCompression {
    Off,
    On,
    #[default]
    Lz4,
    Zstd,
    Gzip,
    Zle,
}

impl ZfsCompression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
            Self::Zle => "zle",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskPool {
    pub name: String,
    pub raid: RaidLevel,
    pub devices: Vec<String>,
    #[serde(default = "default_purpose")]
    pub purpose: PoolPurpose,
    /// Proxmox storage ID, defaults to the pool name
    #[serde(default)]
    pub storage_id: Option<String>,
    #[serde(default = "default_ashift")]
    pub ashift: u8,
    #[serde(default)]
    pub compression: ZfsCompression,
}

fn default_purpose() -> PoolPurpose {
    PoolPurpose::Vm
}

fn default_ashift() -> u8 {
    12
}

impl DiskPool {
    pub fn storage_id(&self) -> &str {
        self.storage_id.as_deref().unwrap_or(&self.name)
    }

    /// Mountpoint ZFS gives the pool's root dataset
    pub fn mountpoint(&self) -> String {
        format!("/{}", self.name)
    }
}

// ============================================================================
// Backup
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Self; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Sun => "sun",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupCompression {
    None,
    Lzo,
    Gzip,
    #[default]
    Zstd,
}

impl BackupCompression {
    /// Value of vzdump's `--compress` option
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Lzo => "lzo",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    #[default]
    Snapshot,
    Suspend,
    Stop,
}

impl BackupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Suspend => "suspend",
            Self::Stop => "stop",
        }
    }
}

/// Guests covered by a backup job: `"all"` or a list of VMIDs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGuestSelection", into = "RawGuestSelection")]
pub enum GuestSelection {
    #[default]
    All,
    List(Vec<u32>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawGuestSelection {
    Keyword(String),
    List(Vec<u32>),
}

impl TryFrom<RawGuestSelection> for GuestSelection {
    type Error = String;

    fn try_from(raw: RawGuestSelection) -> Result<Self, Self::Error> {
        match raw {
            RawGuestSelection::Keyword(k) if k == "all" => Ok(Self::All),
            RawGuestSelection::Keyword(k) => {
                Err(format!("expected \"all\" or a list of VMIDs, got \"{k}\""))
            }
            RawGuestSelection::List(ids) => Ok(Self::List(ids)),
        }
    }
}

impl From<GuestSelection> for RawGuestSelection {
    fn from(selection: GuestSelection) -> Self {
        match selection {
            GuestSelection::All => Self::Keyword("all".to_string()),
            GuestSelection::List(ids) => Self::List(ids),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupPolicy {
    #[serde(default = "default_backup_id")]
    pub id: String,
    /// Target storage ID
    pub storage: String,
    /// Start time, `HH:MM`
    pub schedule: String,
    /// Days the job runs on; empty means every day
    #[serde(default)]
    pub days: Vec<Weekday>,
    /// Number of backups kept per guest
    #[serde(default = "default_retention")]
    pub retention: u32,
    #[serde(default)]
    pub compression: BackupCompression,
    #[serde(default)]
    pub mode: BackupMode,
    #[serde(default)]
    pub vmids: GuestSelection,
    #[serde(default)]
    pub mail_to: Option<String>,
}

fn default_backup_id() -> String {
    "pvesetup-backup".to_string()
}

fn default_retention() -> u32 {
    7
}

impl BackupPolicy {
    /// Calendar event passed to `--schedule`
    pub fn calendar_event(&self) -> String {
        let mut days: Vec<Weekday> = self.days.clone();
        days.sort();
        days.dedup();
        if days.is_empty() || days.len() == Weekday::ALL.len() {
            self.schedule.clone()
        } else {
            let days: Vec<&str> = days.iter().map(Weekday::as_str).collect();
            format!("{} {}", days.join(","), self.schedule)
        }
    }
}

// ============================================================================
// Firewall
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallPolicy {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Network allowed to reach the management interfaces
    #[serde(default)]
    pub management_cidr: Option<String>,
    #[serde(default = "default_policy_in")]
    pub policy_in: Verdict,
    #[serde(default = "default_policy_out")]
    pub policy_out: Verdict,
    /// Datacenter-wide rules (`cluster.fw`)
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Node rules (`host.fw`)
    #[serde(default)]
    pub host: Option<HostFirewall>,
    /// Per-guest rules (`<vmid>.fw`)
    #[serde(default)]
    pub guests: Vec<GuestFirewall>,
}

fn default_policy_in() -> Verdict {
    Verdict::Drop
}

fn default_policy_out() -> Verdict {
    Verdict::Accept
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub direction: Direction,
    /// Plain verdict, or the macro's verdict when `macro` is set (default ACCEPT)
    #[serde(default)]
    pub action: Option<Verdict>,
    #[serde(default, rename = "macro")]
    pub macro_name: Option<String>,
    #[serde(default)]
    pub proto: Option<String>,
    #[serde(default)]
    pub dport: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub iface: Option<String>,
    #[serde(default)]
    pub log: Option<LogLevel>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostFirewall {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestFirewall {
    pub vmid: u32,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Appliance template fetched with `pveam`
    Container,
    /// Installer image downloaded over HTTP(S)
    Iso,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateRequest {
    /// Name other entries refer to this template by
    pub os_id: String,
    pub kind: TemplateKind,
    /// `pveam` template name, or the ISO download URL
    pub source: String,
    /// Expected SHA-256 of a downloaded ISO
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default = "default_template_storage")]
    pub storage: String,
}

fn default_template_storage() -> String {
    "local".to_string()
}

impl TemplateRequest {
    /// File name the template is stored under
    pub fn file_name(&self) -> &str {
        match self.kind {
            TemplateKind::Container => &self.source,
            TemplateKind::Iso => self
                .source
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').next())
                .unwrap_or(&self.source),
        }
    }

    /// Proxmox volume ID, e.g. `local:iso/debian-12.iso`
    pub fn volid(&self) -> String {
        let content = match self.kind {
            TemplateKind::Container => "vztmpl",
            TemplateKind::Iso => "iso",
        };
        format!("{}:{}/{}", self.storage, content, self.file_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmTemplate {
    pub vmid: u32,
    pub name: String,
    /// `os_id` of a declared ISO template, or an existing volume ID
    pub iso: String,
    #[serde(default = "default_memory")]
    pub memory: u32,
    #[serde(default = "default_cores")]
    pub cores: u32,
    pub disk_storage: String,
    /// Disk size in GiB
    #[serde(default = "default_disk_size")]
    pub disk_size: u32,
    #[serde(default = "default_bridge")]
    pub bridge: String,
}

fn default_memory() -> u32 {
    2048
}

fn default_cores() -> u32 {
    2
}

fn default_disk_size() -> u32 {
    32
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub policy: FailurePolicy,
}

// ============================================================================
// Validation
// ============================================================================

impl HostSpec {
    /// Validate everything that does not require probing the host
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_host()?;

        if let Some(network) = &self.network {
            validate_network(network)?;
        }
        if let Some(repos) = &self.repositories
            && let Some(codename) = &repos.codename
            && !codename.chars().all(|c| c.is_ascii_lowercase())
        {
            return Err(ConfigError::invalid(
                "repositories.codename",
                format!("'{codename}' is not a Debian codename"),
            ));
        }

        self.validate_pools()?;

        if let Some(backup) = &self.backup {
            validate_backup(backup)?;
        }
        if let Some(firewall) = &self.firewall {
            validate_firewall(firewall)?;
        }

        self.validate_templates()?;
        self.validate_vm_templates()
    }

    fn validate_host(&self) -> Result<(), ConfigError> {
        let host = &self.host;
        if !HOSTNAME_RE.is_match(&host.hostname) {
            return Err(ConfigError::invalid(
                "host.hostname",
                format!("'{}' is not a valid hostname", host.hostname),
            ));
        }
        if let Some(domain) = &host.domain
            && !domain.split('.').all(|label| HOSTNAME_RE.is_match(label))
        {
            return Err(ConfigError::invalid(
                "host.domain",
                format!("'{domain}' is not a valid domain"),
            ));
        }
        if let Some(node) = &host.node
            && !HOSTNAME_RE.is_match(node)
        {
            return Err(ConfigError::invalid(
                "host.node",
                format!("'{node}' is not a valid node name"),
            ));
        }
        if !TIMEZONE_RE.is_match(&host.timezone) {
            return Err(ConfigError::invalid(
                "host.timezone",
                format!("'{}' is not a timezone name", host.timezone),
            ));
        }
        Ok(())
    }

    fn validate_pools(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut storage_ids = HashSet::new();

        for pool in &self.pools {
            let field = format!("pools.{}", pool.name);
            if !IDENT_RE.is_match(&pool.name) {
                return Err(ConfigError::invalid(
                    "pools.name",
                    format!("'{}' is not a valid pool name", pool.name),
                ));
            }
            if !names.insert(pool.name.as_str()) {
                return Err(ConfigError::invalid(
                    "pools.name",
                    format!("duplicate pool name '{}'", pool.name),
                ));
            }
            if !IDENT_RE.is_match(pool.storage_id()) {
                return Err(ConfigError::invalid(
                    format!("{field}.storage_id"),
                    format!("'{}' is not a valid storage ID", pool.storage_id()),
                ));
            }
            if !storage_ids.insert(pool.storage_id()) {
                return Err(ConfigError::invalid(
                    format!("{field}.storage_id"),
                    format!("duplicate storage ID '{}'", pool.storage_id()),
                ));
            }
            if pool.devices.is_empty() {
                return Err(ConfigError::invalid(
                    format!("{field}.devices"),
                    "at least one device is required",
                ));
            }
            let mut devices = HashSet::new();
            for device in &pool.devices {
                if !device.starts_with("/dev/") {
                    return Err(ConfigError::invalid(
                        format!("{field}.devices"),
                        format!("'{device}' is not a /dev path"),
                    ));
                }
                if !devices.insert(device.as_str()) {
                    return Err(ConfigError::invalid(
                        format!("{field}.devices"),
                        format!("device '{device}' is listed twice"),
                    ));
                }
            }
            if !(9..=16).contains(&pool.ashift) {
                return Err(ConfigError::invalid(
                    format!("{field}.ashift"),
                    format!("{} is outside 9..=16", pool.ashift),
                ));
            }
        }

        // A device may only belong to one pool
        let mut seen = HashSet::new();
        for device in self.pools.iter().flat_map(|p| &p.devices) {
            if !seen.insert(device.as_str()) {
                return Err(ConfigError::invalid(
                    "pools.devices",
                    format!("device '{device}' is used by more than one pool"),
                ));
            }
        }
        Ok(())
    }

    fn validate_templates(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for template in &self.templates {
            let field = format!("templates.{}", template.os_id);
            if !IDENT_RE.is_match(&template.os_id) {
                return Err(ConfigError::invalid(
                    "templates.os_id",
                    format!("'{}' is not a valid identifier", template.os_id),
                ));
            }
            if !ids.insert(template.os_id.as_str()) {
                return Err(ConfigError::invalid(
                    "templates.os_id",
                    format!("duplicate template '{}'", template.os_id),
                ));
            }
            if !IDENT_RE.is_match(&template.storage) {
                return Err(ConfigError::invalid(
                    format!("{field}.storage"),
                    format!("'{}' is not a valid storage ID", template.storage),
                ));
            }
            match template.kind {
                TemplateKind::Iso => {
                    if !(template.source.starts_with("https://")
                        || template.source.starts_with("http://"))
                    {
                        return Err(ConfigError::invalid(
                            format!("{field}.source"),
                            "ISO sources must be http:// or https:// URLs",
                        ));
                    }
                    let name = template.file_name();
                    if name.is_empty() || name.starts_with('.') {
                        return Err(ConfigError::invalid(
                            format!("{field}.source"),
                            "URL does not end in a file name",
                        ));
                    }
                }
                TemplateKind::Container => {
                    if template.source.is_empty() || template.source.contains('/') {
                        return Err(ConfigError::invalid(
                            format!("{field}.source"),
                            "expected a pveam template name such as debian-12-standard_12.7-1_amd64.tar.zst",
                        ));
                    }
                    if template.sha256.is_some() {
                        return Err(ConfigError::invalid(
                            format!("{field}.sha256"),
                            "checksums apply to ISO downloads only",
                        ));
                    }
                }
            }
            if let Some(sum) = &template.sha256
                && !SHA256_RE.is_match(sum)
            {
                return Err(ConfigError::invalid(
                    format!("{field}.sha256"),
                    "expected 64 hexadecimal characters",
                ));
            }
        }
        Ok(())
    }

    fn validate_vm_templates(&self) -> Result<(), ConfigError> {
        let mut vmids = HashSet::new();
        for vm in &self.vm_templates {
            let field = format!("vm_templates.{}", vm.vmid);
            validate_vmid(&field, vm.vmid)?;
            if !vmids.insert(vm.vmid) {
                return Err(ConfigError::invalid(
                    "vm_templates.vmid",
                    format!("duplicate guest ID {}", vm.vmid),
                ));
            }
            if !HOSTNAME_RE.is_match(&vm.name) {
                return Err(ConfigError::invalid(
                    format!("{field}.name"),
                    format!("'{}' is not a valid guest name", vm.name),
                ));
            }
            if vm.memory < 16 || vm.cores == 0 || vm.disk_size == 0 {
                return Err(ConfigError::invalid(
                    field,
                    "memory, cores and disk_size must be positive",
                ));
            }
            if let Some(template) = self.templates.iter().find(|t| t.os_id == vm.iso)
                && template.kind != TemplateKind::Iso
            {
                return Err(ConfigError::invalid(
                    format!("{field}.iso"),
                    format!("template '{}' is not an ISO image", vm.iso),
                ));
            }
        }
        Ok(())
    }
}

fn validate_network(network: &NetworkConfig) -> Result<(), ConfigError> {
    if !IDENT_RE.is_match(&network.name) {
        return Err(ConfigError::invalid(
            "network.name",
            format!("'{}' is not a valid interface name", network.name),
        ));
    }
    parse_cidr(&network.address)
        .map_err(|message| ConfigError::invalid("network.address", message))?;
    if let Some(gateway) = &network.gateway {
        gateway.parse::<IpAddr>().map_err(|_| {
            ConfigError::invalid("network.gateway", format!("'{gateway}' is not an IP address"))
        })?;
    }
    if let Some(port) = network.bridge_ports.iter().find(|p| !IDENT_RE.is_match(p)) {
        return Err(ConfigError::invalid(
            "network.bridge_ports",
            format!("'{port}' is not a valid interface name"),
        ));
    }
    Ok(())
}

fn validate_backup(backup: &BackupPolicy) -> Result<(), ConfigError> {
    if !IDENT_RE.is_match(&backup.id) {
        return Err(ConfigError::invalid(
            "backup.id",
            format!("'{}' is not a valid job ID", backup.id),
        ));
    }
    if !SCHEDULE_RE.is_match(&backup.schedule) {
        return Err(ConfigError::invalid(
            "backup.schedule",
            format!("'{}' is not HH:MM", backup.schedule),
        ));
    }
    let mut days = HashSet::new();
    if let Some(day) = backup.days.iter().find(|d| !days.insert(**d)) {
        return Err(ConfigError::invalid(
            "backup.days",
            format!("'{}' is listed twice", day.as_str()),
        ));
    }
    if backup.retention == 0 {
        return Err(ConfigError::invalid("backup.retention", "must keep at least one backup"));
    }
    if let GuestSelection::List(ids) = &backup.vmids {
        if ids.is_empty() {
            return Err(ConfigError::invalid("backup.vmids", "list is empty"));
        }
        let mut seen = HashSet::new();
        for id in ids {
            validate_vmid("backup.vmids", *id)?;
            if !seen.insert(id) {
                return Err(ConfigError::invalid(
                    "backup.vmids",
                    format!("duplicate guest ID {id}"),
                ));
            }
        }
    }
    if let Some(mail) = &backup.mail_to
        && (!mail.contains('@') || mail.contains(char::is_whitespace))
    {
        return Err(ConfigError::invalid(
            "backup.mail_to",
            format!("'{mail}' is not an email address"),
        ));
    }
    Ok(())
}

fn validate_firewall(firewall: &FirewallPolicy) -> Result<(), ConfigError> {
    if let Some(cidr) = &firewall.management_cidr {
        parse_cidr(cidr)
            .map_err(|message| ConfigError::invalid("firewall.management_cidr", message))?;
    }
    validate_rules("firewall.rules", &firewall.rules)?;
    if let Some(host) = &firewall.host {
        validate_rules("firewall.host.rules", &host.rules)?;
    }

    let mut vmids = HashSet::new();
    for guest in &firewall.guests {
        let field = format!("firewall.guests.{}", guest.vmid);
        validate_vmid(&field, guest.vmid)?;
        if !vmids.insert(guest.vmid) {
            return Err(ConfigError::invalid(
                "firewall.guests",
                format!("duplicate guest ID {}", guest.vmid),
            ));
        }
        validate_rules(&format!("{field}.rules"), &guest.rules)?;
    }
    Ok(())
}

fn validate_rules(field: &str, rules: &[RuleSpec]) -> Result<(), ConfigError> {
    for (index, rule) in rules.iter().enumerate() {
        let field = format!("{field}[{index}]");
        match &rule.macro_name {
            Some(name) if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) => {
                return Err(ConfigError::invalid(
                    format!("{field}.macro"),
                    format!("'{name}' is not a macro name"),
                ));
            }
            Some(_) => {}
            None if rule.action.is_none() => {
                return Err(ConfigError::invalid(field, "either action or macro is required"));
            }
            None => {}
        }

        let values = [
            ("proto", &rule.proto),
            ("dport", &rule.dport),
            ("sport", &rule.sport),
            ("source", &rule.source),
            ("dest", &rule.dest),
            ("iface", &rule.iface),
        ];
        for (name, value) in values {
            if let Some(value) = value
                && (value.is_empty() || value.contains(char::is_whitespace) || value.contains('#'))
            {
                return Err(ConfigError::invalid(
                    format!("{field}.{name}"),
                    format!("'{value}' must be a single token"),
                ));
            }
        }
        if let Some(comment) = &rule.comment
            && comment.contains('\n')
        {
            return Err(ConfigError::invalid(
                format!("{field}.comment"),
                "comments must fit on one line",
            ));
        }
    }
    Ok(())
}

fn validate_vmid(field: &str, vmid: u32) -> Result<(), ConfigError> {
    if (100..=999_999_999).contains(&vmid) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("guest ID {vmid} is outside 100..=999999999"),
        ))
    }
}

/// Parse `address/prefix`, checking the prefix against the address family
pub fn parse_cidr(cidr: &str) -> Result<(IpAddr, u8), String> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("'{cidr}' is not in CIDR notation"))?;
    let address: IpAddr = address
        .parse()
        .map_err(|_| format!("'{address}' is not an IP address"))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("'{prefix}' is not a prefix length"))?;
    let max = if address.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("prefix /{prefix} is longer than {max} bits"));
    }
    Ok((address, prefix))
}

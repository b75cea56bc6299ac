//! Probing current host state
//!
//! Every query goes through a [`CommandRunner`]. A tool that is missing
//! or fails yields an empty answer: a fresh host legitimately has no
//! pools, storages or backup jobs yet.

use crate::layout::PveLayout;
use crate::render;
use crate::schema::HostSpec;
use declarative::CommandRunner;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

/// Snapshot of the host, rebuilt on every run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbedState {
    pub hostname: Option<String>,
    pub timezone: Option<String>,
    /// Debian release codename from `/etc/os-release`
    pub codename: Option<String>,
    pub pools: BTreeSet<String>,
    pub storages: BTreeSet<String>,
    pub backup_jobs: BTreeSet<String>,
    /// VMIDs of existing VMs and containers
    pub guests: BTreeSet<u32>,
    /// `qm config` of existing VMs at the VMIDs VM templates declare
    pub vms: BTreeMap<u32, VmConfig>,
    /// Volume IDs of templates and ISO images, e.g. `local:iso/debian.iso`
    pub volumes: BTreeSet<String>,
    /// Contents of managed files that exist
    pub files: BTreeMap<PathBuf, String>,
}

/// The parts of a VM's configuration planning looks at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VmConfig {
    pub name: Option<String>,
    pub template: bool,
}

impl ProbedState {
    pub fn has_pool(&self, name: &str) -> bool {
        self.pools.contains(name)
    }

    pub fn has_storage(&self, id: &str) -> bool {
        self.storages.contains(id)
    }

    pub fn has_volume(&self, volid: &str) -> bool {
        self.volumes.contains(volid)
    }
}

/// Probe the host for everything the host description touches
pub fn probe(spec: &HostSpec, layout: &PveLayout, runner: &dyn CommandRunner) -> ProbedState {
    let mut state = ProbedState {
        hostname: first_line(runner, "hostname", &[]),
        timezone: first_line(runner, "timedatectl", &["show", "-p", "Timezone", "--value"]),
        codename: read_codename(layout),
        pools: lines(runner, "zpool", &["list", "-H", "-o", "name"])
            .into_iter()
            .collect(),
        storages: parse_table_ids(&lines(runner, "pvesm", &["status"])),
        backup_jobs: backup_job_ids(runner),
        ..ProbedState::default()
    };

    let vmids = guest_ids(runner, "qm");
    state.guests.extend(&vmids);
    state.guests.extend(guest_ids(runner, "pct"));

    for vm in spec.vm_templates.iter().filter(|vm| vmids.contains(&vm.vmid)) {
        let vmid = vm.vmid.to_string();
        match runner.run_capture("qm", &["config", &vmid]) {
            Ok(config) => {
                state.vms.insert(vm.vmid, parse_vm_config(&config));
            }
            Err(e) => log::debug!("qm config {vmid} failed: {e:#}"),
        }
    }

    for storage in volume_storages(spec) {
        if !state.has_storage(&storage) {
            continue;
        }
        let found = lines(runner, "pveam", &["list", &storage])
            .into_iter()
            .chain(lines(runner, "pvesm", &["list", &storage, "--content", "iso"]));
        state.volumes.extend(parse_table_ids(&found.collect::<Vec<_>>()));
    }

    // Managed file paths depend on the codename (apt source format)
    match render::managed_files(spec, layout, state.codename.as_deref()) {
        Ok(files) => {
            for file in files {
                if let Ok(content) = fs::read_to_string(&file.path) {
                    state.files.insert(file.path, content);
                }
            }
        }
        Err(e) => log::debug!("Skipping managed file probe: {e}"),
    }

    log::info!(
        "Probed host: {} pools, {} storages, {} backup jobs, {} guests, {} volumes",
        state.pools.len(),
        state.storages.len(),
        state.backup_jobs.len(),
        state.guests.len(),
        state.volumes.len()
    );
    state
}

/// Storages that hold volumes the host description refers to
fn volume_storages(spec: &HostSpec) -> BTreeSet<String> {
    let mut storages: BTreeSet<String> =
        spec.templates.iter().map(|t| t.storage.clone()).collect();
    for vm in &spec.vm_templates {
        if let Some((storage, _)) = vm.iso.split_once(':') {
            storages.insert(storage.to_string());
        }
    }
    storages
}

fn read_codename(layout: &PveLayout) -> Option<String> {
    let path = layout.os_release();
    match fs::read_to_string(&path) {
        Ok(content) => parse_os_release_codename(&content),
        Err(e) => {
            log::debug!("Could not read {}: {e}", path.display());
            None
        }
    }
}

/// `VERSION_CODENAME` from os-release content
pub fn parse_os_release_codename(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "VERSION_CODENAME")
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// First column of a tool's table output, skipping the header row
pub fn parse_table_ids<S: AsRef<str>>(lines: &[S]) -> BTreeSet<String> {
    lines
        .iter()
        .skip(1)
        .filter_map(|line| line.as_ref().split_whitespace().next())
        .map(ToString::to_string)
        .collect()
}

fn guest_ids(runner: &dyn CommandRunner, cmd: &str) -> BTreeSet<u32> {
    parse_table_ids(&lines(runner, cmd, &["list"]))
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect()
}

/// Name and template flag from `qm config <vmid>` output
pub fn parse_vm_config(config: &str) -> VmConfig {
    let mut parsed = VmConfig::default();
    for (key, value) in config.lines().filter_map(|line| line.split_once(':')) {
        match key.trim() {
            "name" => parsed.name = Some(value.trim().to_string()),
            "template" => parsed.template = value.trim() == "1",
            _ => {}
        }
    }
    parsed
}

#[derive(Deserialize)]
struct BackupJob {
    id: String,
}

fn backup_job_ids(runner: &dyn CommandRunner) -> BTreeSet<String> {
    let args = ["get", "/cluster/backup", "--output-format", "json"];
    match runner.run_capture("pvesh", &args) {
        Ok(json) => parse_backup_jobs(&json),
        Err(e) => {
            log::debug!("pvesh backup job query failed: {e:#}");
            BTreeSet::new()
        }
    }
}

/// Job IDs from `pvesh get /cluster/backup --output-format json`
pub fn parse_backup_jobs(json: &str) -> BTreeSet<String> {
    match serde_json::from_str::<Vec<BackupJob>>(json) {
        Ok(jobs) => jobs.into_iter().map(|j| j.id).collect(),
        Err(e) => {
            log::debug!("Unexpected pvesh output: {e}");
            BTreeSet::new()
        }
    }
}

/// Non-empty output lines, or nothing when the command fails
fn lines(runner: &dyn CommandRunner, cmd: &str, args: &[&str]) -> Vec<String> {
    match runner.run_capture(cmd, args) {
        Ok(out) => out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(e) => {
            log::debug!("{cmd} query failed: {e:#}");
            Vec::new()
        }
    }
}

fn first_line(runner: &dyn CommandRunner, cmd: &str, args: &[&str]) -> Option<String> {
    lines(runner, cmd, args).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;
    use crate::testutil::FULL_SPEC;

    const PVESM_STATUS: &str = "\
Name             Type     Status           Total            Used       Available        %
local             dir     active        98497780        12345678        81058304   12.53%
local-zfs     zfspool     active       912345678         1234567       911111111    0.14%
";

    const QM_LIST: &str = "\
      VMID NAME                 STATUS     MEM(MB)    BOOTDISK(GB) PID
       100 web                  running    2048              32.00 1234
      9000 debian12-tmpl        stopped    2048              32.00 0
";

    const PVEAM_LIST: &str = "\
NAME                                                         SIZE
local:vztmpl/debian-12-standard_12.7-1_amd64.tar.zst         120.29MB
";

    fn spec() -> HostSpec {
        toml::from_str(FULL_SPEC).unwrap()
    }

    #[test]
    fn test_parse_os_release() {
        let content = "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nVERSION_CODENAME=bookworm\nID=debian\n";
        assert_eq!(parse_os_release_codename(content).as_deref(), Some("bookworm"));
        assert_eq!(parse_os_release_codename("ID=debian\n"), None);
    }

    #[test]
    fn test_parse_pvesm_status() {
        let lines: Vec<String> = PVESM_STATUS.lines().map(ToString::to_string).collect();
        let ids = parse_table_ids(&lines);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["local", "local-zfs"]);
    }

    #[test]
    fn test_parse_backup_jobs() {
        let json = r#"[{"id":"backup-3f2a","schedule":"02:30","storage":"local"},{"id":"nightly"}]"#;
        let ids = parse_backup_jobs(json);
        assert!(ids.contains("nightly"));
        assert_eq!(ids.len(), 2);
        assert!(parse_backup_jobs("not json").is_empty());
    }

    #[test]
    fn test_parse_vm_config() {
        let config = "boot: order=scsi0;ide2\nname: debian12-tmpl\ntemplate: 1\n";
        let parsed = parse_vm_config(config);
        assert_eq!(parsed.name.as_deref(), Some("debian12-tmpl"));
        assert!(parsed.template);
        assert!(!parse_vm_config("name: web\n").template);
    }

    #[test]
    fn test_fresh_host_probes_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = probe(&spec(), &PveLayout::new(dir.path()), &MockRunner::new());

        assert!(state.hostname.is_none());
        assert!(state.pools.is_empty());
        assert!(state.storages.is_empty());
        assert!(state.guests.is_empty());
        assert!(state.files.is_empty());
    }

    #[test]
    fn test_probe_reads_tools_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PveLayout::new(dir.path());
        let cluster = layout.cluster_firewall();
        fs::create_dir_all(cluster.parent().unwrap()).unwrap();
        fs::write(&cluster, "[OPTIONS]\n\nenable: 0\n").unwrap();
        fs::create_dir_all(layout.os_release().parent().unwrap()).unwrap();
        fs::write(layout.os_release(), "VERSION_CODENAME=bookworm\n").unwrap();

        let runner = MockRunner::new()
            .ok("hostname", "pve1\n")
            .ok("timedatectl show -p Timezone --value", "Etc/UTC\n")
            .ok("zpool list -H -o name", "rpool\nnvme-mirror\n")
            .ok("pvesm status", PVESM_STATUS)
            .ok("pvesh get /cluster/backup --output-format json", "[]")
            .ok("qm list", QM_LIST)
            .ok("qm config 9000", "name: debian12-tmpl\nmemory: 2048\n")
            .fail("pct list", 1, "")
            .ok("pveam list local", PVEAM_LIST)
            .ok("pvesm list local --content iso", "Volid Format Type Size VMID\n");

        let state = probe(&spec(), &layout, &runner);

        assert_eq!(state.hostname.as_deref(), Some("pve1"));
        assert_eq!(state.timezone.as_deref(), Some("Etc/UTC"));
        assert_eq!(state.codename.as_deref(), Some("bookworm"));
        assert!(state.has_pool("nvme-mirror"));
        assert!(state.has_storage("local-zfs"));
        assert_eq!(state.guests.iter().copied().collect::<Vec<_>>(), vec![100, 9000]);
        assert_eq!(
            state.vms.get(&9000),
            Some(&VmConfig {
                name: Some("debian12-tmpl".to_string()),
                template: false,
            })
        );
        assert!(!state.vms.contains_key(&100));
        assert!(state.has_volume("local:vztmpl/debian-12-standard_12.7-1_amd64.tar.zst"));
        assert_eq!(state.files.get(&cluster).map(String::as_str), Some("[OPTIONS]\n\nenable: 0\n"));
    }
}

//! Shared fixtures for unit tests.

pub const FULL_SPEC: &str = r#"
[host]
hostname = "pve1"
domain = "lab.example"
timezone = "Europe/Berlin"

[network]
name = "vmbr0"
address = "192.168.1.10/24"
gateway = "192.168.1.1"
bridge_ports = ["eno1"]

[repositories]
codename = "bookworm"

[[pools]]
name = "nvme-mirror"
raid = "mirror"
devices = ["/dev/nvme0n1", "/dev/nvme1n1"]
storage_id = "vm-storage"

[[pools]]
name = "backup"
raid = "raidz1"
devices = ["/dev/sda", "/dev/sdb", "/dev/sdc"]
purpose = "backup"

[backup]
id = "nightly"
storage = "backup"
schedule = "02:30"
days = ["mon", "wed", "fri"]
retention = 5
mail_to = "ops@lab.example"

[firewall]
management_cidr = "192.168.1.0/24"

[[firewall.rules]]
direction = "in"
macro = "SSH"
source = "+management"

[[firewall.guests]]
vmid = 9000
rules = [{ direction = "in", action = "ACCEPT", proto = "tcp", dport = "22" }]

[[templates]]
os_id = "debian12"
kind = "container"
source = "debian-12-standard_12.7-1_amd64.tar.zst"

[[templates]]
os_id = "debian12-iso"
kind = "iso"
source = "https://cdimage.debian.org/debian-cd/current/amd64/iso-cd/debian-12.7.0-amd64-netinst.iso"

[[vm_templates]]
vmid = 9000
name = "debian12-tmpl"
iso = "debian12-iso"
disk_storage = "vm-storage"
"#;

use crate::layout::PveLayout;
use crate::probe::{ProbedState, VmConfig};
use crate::render;
use crate::schema::HostSpec;

pub fn full_spec() -> HostSpec {
    toml::from_str(FULL_SPEC).unwrap()
}

/// A host that already matches `spec` in every respect
pub fn converged(spec: &HostSpec, layout: &PveLayout) -> ProbedState {
    let mut state = ProbedState {
        hostname: Some(spec.host.hostname.clone()),
        timezone: Some(spec.host.timezone.clone()),
        codename: Some("bookworm".to_string()),
        ..ProbedState::default()
    };
    state.storages.insert("local".to_string());
    for pool in &spec.pools {
        state.pools.insert(pool.name.clone());
        state.storages.insert(pool.storage_id().to_string());
    }
    if let Some(backup) = &spec.backup {
        state.backup_jobs.insert(backup.id.clone());
    }
    state.volumes.extend(spec.templates.iter().map(|t| t.volid()));
    for vm in &spec.vm_templates {
        state.guests.insert(vm.vmid);
        let config = VmConfig {
            name: Some(vm.name.clone()),
            template: true,
        };
        state.vms.insert(vm.vmid, config);
    }
    for file in render::managed_files(spec, layout, state.codename.as_deref()).unwrap() {
        state.files.insert(file.path, file.content);
    }
    state
}

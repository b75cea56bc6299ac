//! VM templates built from an installer ISO

use anyhow::Result;
use declarative::error::command_line;
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};

use super::{storage_key, volume_key};
use crate::probe;
use crate::schema::VmTemplate as VmTemplateSpec;

/// A VM created with `qm create` and converted with `qm template`
#[derive(Debug, Clone)]
pub struct VmTemplate {
    pub vmid: u32,
    pub name: String,
    /// Volume ID of the installer ISO attached as a CD-ROM
    pub iso_volid: String,
    pub memory: u32,
    pub cores: u32,
    pub disk_storage: String,
    pub disk_size: u32,
    pub bridge: String,
    /// The VM exists already and only needs converting
    pub existing: bool,
}

impl VmTemplate {
    pub fn new(spec: &VmTemplateSpec, iso_volid: String) -> Self {
        Self {
            vmid: spec.vmid,
            name: spec.name.clone(),
            iso_volid,
            memory: spec.memory,
            cores: spec.cores,
            disk_storage: spec.disk_storage.clone(),
            disk_size: spec.disk_size,
            bridge: spec.bridge.clone(),
            existing: false,
        }
    }

    /// Convert a VM that was created but never turned into a template
    pub fn convert(spec: &VmTemplateSpec) -> Self {
        Self {
            existing: true,
            ..Self::new(spec, String::new())
        }
    }

    /// Arguments to `qm`
    pub fn create_args(&self) -> Vec<String> {
        vec![
            "create".to_string(),
            self.vmid.to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--memory".to_string(),
            self.memory.to_string(),
            "--cores".to_string(),
            self.cores.to_string(),
            "--net0".to_string(),
            format!("virtio,bridge={}", self.bridge),
            "--scsihw".to_string(),
            "virtio-scsi-pci".to_string(),
            "--scsi0".to_string(),
            format!("{}:{}", self.disk_storage, self.disk_size),
            "--ide2".to_string(),
            format!("{},media=cdrom", self.iso_volid),
            "--ostype".to_string(),
            "l26".to_string(),
        ]
    }

}

impl Action for VmTemplate {
    fn id(&self) -> String {
        self.vmid.to_string()
    }

    fn description(&self) -> String {
        if self.existing {
            format!("Convert VM {} ({}) to a template", self.vmid, self.name)
        } else {
            format!("Create VM template {} ({})", self.vmid, self.name)
        }
    }

    fn action_type(&self) -> &'static str {
        "vm_template"
    }

    fn details(&self) -> Option<String> {
        if self.existing {
            let vmid = self.vmid.to_string();
            return Some(command_line("qm", &["template", vmid.as_str()]));
        }
        let args = self.create_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(command_line("qm", &args))
    }

    fn requires(&self) -> Vec<String> {
        if self.existing {
            return Vec::new();
        }
        vec![
            volume_key(&self.iso_volid),
            storage_key(&self.disk_storage),
        ]
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let vmid = self.vmid.to_string();
        if !ctx.runner.run_status("qm", &["status", &vmid])? {
            return Ok(ResourceState::Absent);
        }
        let config = ctx.runner.run_capture("qm", &["config", &vmid])?;
        Ok(if probe::parse_vm_config(&config).template {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Modified {
                from: "vm".to_string(),
                to: "template".to_string(),
            }
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let vmid = self.vmid.to_string();
        let created = if ctx.runner.run_status("qm", &["status", &vmid])? {
            false
        } else {
            let args = self.create_args();
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            ctx.runner.run_checked("qm", &args)?;
            true
        };
        ctx.runner.run_checked("qm", &["template", &vmid])?;

        Ok(if created {
            ApplyResult::Created
        } else {
            ApplyResult::Modified
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;

    fn template() -> VmTemplate {
        VmTemplate {
            vmid: 9000,
            name: "debian12-tmpl".to_string(),
            iso_volid: "local:iso/debian-12.iso".to_string(),
            memory: 2048,
            cores: 2,
            disk_storage: "vm-storage".to_string(),
            disk_size: 32,
            bridge: "vmbr0".to_string(),
            existing: false,
        }
    }

    const CREATE: &str = "qm create 9000 --name debian12-tmpl --memory 2048 --cores 2 \
--net0 virtio,bridge=vmbr0 --scsihw virtio-scsi-pci --scsi0 vm-storage:32 \
--ide2 local:iso/debian-12.iso,media=cdrom --ostype l26";

    #[test]
    fn test_create_command_line() {
        assert_eq!(template().details().unwrap(), CREATE);
    }

    #[test]
    fn test_apply_creates_and_converts() {
        let runner = MockRunner::new()
            .fail(
                "qm status 9000",
                2,
                "Configuration file 'nodes/pve1/qemu-server/9000.conf' does not exist",
            )
            .ok(CREATE, "")
            .ok("qm template 9000", "");
        let mut ctx = ApplyContext::new(false, &runner);

        let result = template().apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Created));
        assert_eq!(runner.calls_to("qm template").len(), 1);
    }

    #[test]
    fn test_existing_vm_is_only_converted() {
        let runner = MockRunner::new()
            .ok("qm status 9000", "status: stopped\n")
            .ok("qm config 9000", "name: debian12-tmpl\nmemory: 2048\n")
            .ok("qm template 9000", "");
        let mut ctx = ApplyContext::new(false, &runner);

        assert!(!template().is_satisfied(&ctx).unwrap());
        let result = template().apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Modified));
        assert!(runner.calls_to("qm create").is_empty());
    }

    #[test]
    fn test_conversion_needs_no_iso() {
        let template = VmTemplate {
            existing: true,
            ..template()
        };
        assert!(template.requires().is_empty());
        assert_eq!(template.details().unwrap(), "qm template 9000");
        assert!(template.description().starts_with("Convert VM 9000"));
    }
}

//! Proxmox storage entries backed by a pool

use anyhow::Result;
use declarative::error::command_line;
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};

use super::{pool_key, storage_key, table_lists};
use crate::schema::{DiskPool, PoolPurpose};

/// Register a pool with `pvesm`
#[derive(Debug, Clone)]
pub struct PveStorage {
    pub id: String,
    pub pool: String,
    pub purpose: PoolPurpose,
    pub mountpoint: String,
}

impl PveStorage {
    pub fn new(pool: &DiskPool) -> Self {
        Self {
            id: pool.storage_id().to_string(),
            pool: pool.name.clone(),
            purpose: pool.purpose,
            mountpoint: pool.mountpoint(),
        }
    }

    /// Arguments to `pvesm`
    ///
    /// VM pools become `zfspool` storage for disk images. Backup and ISO
    /// pools are exposed as directories on the pool's mountpoint.
    pub fn add_args(&self) -> Vec<String> {
        let content = self.purpose.content().join(",");
        let args: Vec<&str> = match self.purpose {
            PoolPurpose::Vm => vec![
                "add",
                "zfspool",
                self.id.as_str(),
                "--pool",
                self.pool.as_str(),
                "--content",
                content.as_str(),
                "--sparse",
                "1",
            ],
            PoolPurpose::Backup | PoolPurpose::Iso => vec![
                "add",
                "dir",
                self.id.as_str(),
                "--path",
                self.mountpoint.as_str(),
                "--content",
                content.as_str(),
            ],
        };
        args.into_iter().map(String::from).collect()
    }
}

impl Action for PveStorage {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Add storage {} on pool {}", self.id, self.pool)
    }

    fn action_type(&self) -> &'static str {
        "pve_storage"
    }

    fn details(&self) -> Option<String> {
        let args = self.add_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(command_line("pvesm", &args))
    }

    fn provides(&self) -> Vec<String> {
        vec![storage_key(&self.id)]
    }

    fn requires(&self) -> Vec<String> {
        vec![pool_key(&self.pool)]
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let output = ctx.runner.run_capture("pvesm", &["status"])?;
        Ok(if table_lists(&output, &self.id) {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let args = self.add_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.runner.run_checked("pvesm", &args)?;
        Ok(ApplyResult::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;

    fn storage(purpose: PoolPurpose) -> PveStorage {
        PveStorage {
            id: "vm-storage".to_string(),
            pool: "nvme-mirror".to_string(),
            purpose,
            mountpoint: "/nvme-mirror".to_string(),
        }
    }

    #[test]
    fn test_vm_storage_is_zfspool() {
        assert_eq!(
            storage(PoolPurpose::Vm).add_args().join(" "),
            "add zfspool vm-storage --pool nvme-mirror --content images,rootdir --sparse 1"
        );
    }

    #[test]
    fn test_backup_storage_is_dir() {
        assert_eq!(
            storage(PoolPurpose::Backup).add_args().join(" "),
            "add dir vm-storage --path /nvme-mirror --content backup"
        );
        let iso = storage(PoolPurpose::Iso).add_args().join(" ");
        assert!(iso.ends_with("--content iso,vztmpl"));
    }

    #[test]
    fn test_requires_pool() {
        let storage = storage(PoolPurpose::Vm);
        assert_eq!(storage.requires(), vec!["pool:nvme-mirror"]);
        assert_eq!(storage.provides(), vec!["storage:vm-storage"]);
    }

    #[test]
    fn test_state_from_pvesm_status() {
        let runner = MockRunner::new().ok(
            "pvesm status",
            "Name Type Status\nlocal dir active\nvm-storage zfspool active\n",
        );
        let ctx = ApplyContext::new(false, &runner);
        assert!(storage(PoolPurpose::Vm).is_satisfied(&ctx).unwrap());
    }
}

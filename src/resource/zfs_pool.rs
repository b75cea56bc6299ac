//! ZFS pool creation

use anyhow::Result;
use declarative::error::command_line;
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};

use super::pool_key;
use crate::schema::{DiskPool, RaidLevel, ZfsCompression};

/// A pool to create from whole disks
///
/// Creating a pool wipes its member devices.
#[derive(Debug, Clone)]
pub struct ZfsPool {
    pub name: String,
    pub raid: RaidLevel,
    pub devices: Vec<String>,
    pub ashift: u8,
    pub compression: ZfsCompression,
}

impl ZfsPool {
    pub fn new(pool: &DiskPool) -> Self {
        Self {
            name: pool.name.clone(),
            raid: pool.raid,
            devices: pool.devices.clone(),
            ashift: pool.ashift,
            compression: pool.compression,
        }
    }

    /// Arguments to `zpool`
    pub fn create_args(&self) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "-f".to_string(),
            "-o".to_string(),
            format!("ashift={}", self.ashift),
            self.name.clone(),
        ];
        args.extend(self.raid.vdev_args(&self.devices));
        args
    }

    fn compression_arg(&self) -> String {
        format!("compression={}", self.compression.as_str())
    }
}

impl Action for ZfsPool {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!(
            "Create ZFS pool {} ({}, {} devices)",
            self.name,
            self.raid,
            self.devices.len()
        )
    }

    fn action_type(&self) -> &'static str {
        "zfs_pool"
    }

    fn details(&self) -> Option<String> {
        let args = self.create_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(format!(
            "{}\nwipes: {}",
            command_line("zpool", &args),
            self.devices.join(", ")
        ))
    }

    fn provides(&self) -> Vec<String> {
        vec![pool_key(&self.name)]
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let exists = ctx
            .runner
            .run_status("zpool", &["list", "-H", "-o", "name", &self.name])?;
        Ok(if exists {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let args = self.create_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.runner.run_checked("zpool", &args)?;
        log::info!("Created pool {}", self.name);

        ctx.runner
            .run_checked("zfs", &["set", &self.compression_arg(), &self.name])?;
        Ok(ApplyResult::Created)
    }
}

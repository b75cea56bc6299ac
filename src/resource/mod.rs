//! Host actions
//!
//! Each type converges one piece of the host (a pool, a storage entry, a
//! managed file) and implements [`declarative::Action`]. Actions find
//! each other through dependency keys built by the helpers below.

pub mod backup_job;
pub mod host;
pub mod managed_file;
pub mod pve_storage;
pub mod template;
pub mod vm_template;
pub mod zfs_pool;

pub use backup_job::BackupJob;
pub use host::{Hostname, Timezone};
pub use managed_file::ManagedFile;
pub use pve_storage::PveStorage;
pub use template::{ContainerTemplate, IsoImage, TemplateIndex};
pub use vm_template::VmTemplate;
pub use zfs_pool::ZfsPool;

/// Key provided once `pveam update` has run
pub const TEMPLATE_INDEX_KEY: &str = "template_index";

pub fn pool_key(name: &str) -> String {
    format!("pool:{name}")
}

pub fn storage_key(id: &str) -> String {
    format!("storage:{id}")
}

pub fn volume_key(volid: &str) -> String {
    format!("volume:{volid}")
}

/// Whether a tool's table output lists an ID in its first column
pub(crate) fn table_lists(output: &str, id: &str) -> bool {
    let lines: Vec<&str> = output.lines().collect();
    crate::probe::parse_table_ids(&lines).contains(id)
}

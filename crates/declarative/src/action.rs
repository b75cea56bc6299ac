//! Action trait for idempotent host changes
//!
//! An Action represents one unit of change that converges some
//! resource on the host to a desired state.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for idempotent actions
///
/// Every action in a plan implements this trait, which provides:
/// - Identity (id, description, type)
/// - Dependency keys (what it provides, what it requires)
/// - A precondition (current vs desired state) and a postcondition
/// - State convergence (apply)
///
/// # Example
///
/// ```ignore
/// use declarative::{Action, ApplyContext, ApplyResult, ResourceState};
///
/// #[derive(Debug)]
/// struct Hostname(String);
///
/// impl Action for Hostname {
///     fn id(&self) -> String {
///         self.0.clone()
///     }
///
///     fn description(&self) -> String {
///         format!("Set hostname to {}", self.0)
///     }
///
///     fn action_type(&self) -> &'static str {
///         "hostname"
///     }
///
///     fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
///         let name = ctx.runner.run_capture("hostname", &[])?;
///         Ok(ResourceState::Present { details: Some(name.trim().to_string()) })
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: Some(self.0.clone()) }
///     }
///
///     fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
///         ctx.runner.run_checked("hostnamectl", &["set-hostname", &self.0])?;
///         Ok(ApplyResult::Modified)
///     }
/// }
/// ```
pub trait Action: Send + Sync + fmt::Debug {
    /// Unique identifier for this action
    ///
    /// This should be stable and uniquely identify the action
    /// within its type. Examples:
    /// - "nvme-mirror" for a ZFS pool
    /// - "vm-storage" for a storage entry
    /// - "/etc/pve/firewall/cluster.fw" for a managed file
    fn id(&self) -> String;

    /// Human-readable description of what this action does
    fn description(&self) -> String;

    /// Action type category
    ///
    /// Used for grouping and filtering. Examples:
    /// - "zfs_pool", "pve_storage"
    /// - "firewall_file", "apt_source"
    fn action_type(&self) -> &'static str;

    /// Extra detail shown when previewing a plan (a command line, a diff)
    fn details(&self) -> Option<String> {
        None
    }

    /// Dependency keys this action makes available, e.g. "pool:tank"
    fn provides(&self) -> Vec<String> {
        Vec::new()
    }

    /// Dependency keys this action needs to exist before it runs
    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether applying this action irreversibly changes the host
    /// (partitioning, pool creation). The first destructive action of
    /// a run is the point of no return.
    fn is_destructive(&self) -> bool {
        false
    }

    /// Detect the current state of the resource this action converges
    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState>;

    /// Get the desired state for the resource
    fn desired_state(&self) -> ResourceState;

    /// Precondition: whether the host is already in the desired state
    ///
    /// Default implementation compares current and desired states.
    fn is_satisfied(&self, ctx: &ApplyContext) -> Result<bool> {
        Ok(self.current_state(ctx)? == self.desired_state())
    }

    /// Apply changes to reach the desired state
    ///
    /// Only called when [`Action::is_satisfied`] returned false.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// Postcondition: checked after a successful apply
    fn verify(&self, ctx: &ApplyContext) -> Result<bool> {
        self.is_satisfied(ctx)
    }
}

/// A boxed action for type-erased storage
pub type BoxedAction = Box<dyn Action>;

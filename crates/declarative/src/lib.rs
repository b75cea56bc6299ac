//! # Declarative
//!
//! A framework for applying ordered plans of idempotent actions.
//!
//! This crate provides the core abstractions for describing a unit of
//! change, checking whether it is already satisfied, and applying a
//! sequence of such units against a host under an explicit failure policy.
//!
//! ## Core Concepts
//!
//! - **Action**: One idempotent unit of change (create a pool, write a file)
//! - **ResourceState**: The current or desired state an action converges
//! - **Plan**: An ordered list of actions with dependency keys
//! - **Executor**: Applies a plan strictly in order, recording outcomes
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     Action, ActionRecord, ApplyContext, ApplyResult, ExecuteOptions,
//!     Plan, ResourceState, execute_simple,
//! };
//!
//! #[derive(Debug)]
//! struct Marker { path: String }
//!
//! impl Action for Marker {
//!     fn id(&self) -> String { self.path.clone() }
//!     fn description(&self) -> String { format!("Create marker {}", self.path) }
//!     fn action_type(&self) -> &'static str { "marker" }
//!
//!     fn current_state(&self, _ctx: &ApplyContext) -> anyhow::Result<ResourceState> {
//!         if std::path::Path::new(&self.path).exists() {
//!             Ok(ResourceState::Present { details: None })
//!         } else {
//!             Ok(ResourceState::Absent)
//!         }
//!     }
//!
//!     fn desired_state(&self) -> ResourceState {
//!         ResourceState::Present { details: None }
//!     }
//!
//!     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
//!         std::fs::write(&self.path, "")?;
//!         Ok(ApplyResult::Created)
//!     }
//! }
//!
//! let mut plan = Plan::new();
//! plan.push(Box::new(Marker { path: "/tmp/marker".into() }));
//!
//! let report = execute_simple(&plan, &ExecuteOptions::default(), &runner)?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`CommandRunner`]: Runs external commands on the host
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Passes the point of no return before destructive actions
//!
//! This keeps the crate free of hard dependencies on terminal UI or
//! process-spawning details, so plans can be executed against a mock host.

pub mod action;
pub mod context;
pub mod error;
pub mod executor;
pub mod planner;
pub mod types;

// Re-export main types at crate root
pub use action::{Action, BoxedAction};
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, CommandRunner, ConfirmCallback, NoProgress,
    ProgressCallback,
};
pub use error::Error;
pub use executor::{execute, execute_simple};
pub use planner::Plan;
pub use types::{
    ActionRecord, ApplyResult, CommandOutput, ExecuteOptions, ExecuteSummary, FailurePolicy,
    Outcome, ResourceState, RunReport,
};

//! Execution engine
//!
//! 1. Planning - compare the host description with the probed host
//! 2. Diffing - show what a run would change
//! 3. Executing - apply the plan in order behind one confirmation

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{RunOptions, execute};
pub use planner::build_plan;

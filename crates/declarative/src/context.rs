//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on specific implementations of process spawning, progress, etc.

use crate::error::Error;
use crate::types::{ApplyResult, CommandOutput};
use anyhow::Result;

/// Runner for external host commands
///
/// Implement this trait to spawn real processes, or to script
/// responses in tests.
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output
    ///
    /// Returns `Err` only when the command could not be started.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command and return just success/failure
    fn run_status(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        Ok(self.run(cmd, args)?.success)
    }

    /// Run a command, failing with [`Error::ExternalCommandFailure`] on non-zero exit
    fn run_checked(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(cmd, args)?;
        if !output.success {
            return Err(Error::command_failed(cmd, args, &output).into());
        }
        Ok(output)
    }

    /// Run a command and capture stdout
    fn run_capture(&self, cmd: &str, args: &[&str]) -> Result<String> {
        Ok(self.run_checked(cmd, args)?.stdout_str())
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called once before the first action
    fn on_plan_start(&mut self, count: usize);

    /// Called when starting to apply a single action
    fn on_action_start(&mut self, id: &str, description: &str);

    /// Called when an action completes, including skipped actions
    fn on_action_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called after the last action
    fn on_plan_complete(&mut self);
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle the point-of-no-return confirmation.
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Arguments
    /// * `prompt` - The confirmation prompt to show
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_plan_start(&mut self, _count: usize) {}
    fn on_action_start(&mut self, _id: &str, _description: &str) {}
    fn on_action_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_plan_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to action apply operations
pub struct ApplyContext<'a> {
    /// Whether to output verbose information
    pub verbose: bool,
    /// Runner for host commands
    pub runner: &'a dyn CommandRunner,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(verbose: bool, runner: &'a dyn CommandRunner) -> Self {
        Self { verbose, runner }
    }
}

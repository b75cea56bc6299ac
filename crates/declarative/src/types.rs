//! Core types for declarative action plans

use serde::{Deserialize, Serialize};
use std::process::Output;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

/// Coarse outcome of one action, as recorded in run logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Skipped,
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of applying an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyResult {
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Apply was skipped
    Skipped { reason: String },
    /// Apply failed
    Failed { error: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }

    /// Collapse the result into applied/skipped/failed
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Created | Self::Modified => Outcome::Applied,
            Self::Skipped { .. } => Outcome::Skipped,
            Self::Failed { .. } => Outcome::Failed,
        }
    }

    /// Human-readable message attached to the result
    pub fn message(&self) -> String {
        match self {
            Self::Created => "created".to_string(),
            Self::Modified => "modified".to_string(),
            Self::Skipped { reason } => reason.clone(),
            Self::Failed { error } => error.clone(),
        }
    }
}

/// What to do with the rest of a plan once an action fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure; later actions are recorded as skipped
    #[default]
    FailFast,
    /// Keep going with actions that do not depend on a failed action
    Continue,
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Halt or continue after a failure
    pub policy: FailurePolicy,
    /// Verbose output
    pub verbose: bool,
}

/// Outcome of a single action within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unique identifier of the action
    pub id: String,
    /// Type of the action
    pub action_type: String,
    /// Human-readable description
    pub description: String,
    /// Coarse outcome
    pub outcome: Outcome,
    /// Detailed result
    #[serde(flatten)]
    pub result: ApplyResult,
}

impl ActionRecord {
    pub fn new(id: String, action_type: &str, description: String, result: ApplyResult) -> Self {
        Self {
            id,
            action_type: action_type.to_string(),
            description,
            outcome: result.outcome(),
            result,
        }
    }
}

/// Every record produced by one execution of a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub records: Vec<ActionRecord>,
    /// Whether execution stopped before reaching the end of the plan
    pub halted: bool,
}

impl RunReport {
    /// Tally the records
    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for record in &self.records {
            summary.add_result(&record.result);
        }
        summary
    }

    /// Check if execution was fully successful (no failures, no halt)
    pub fn is_success(&self) -> bool {
        !self.halted && self.records.iter().all(|r| r.result.is_success())
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of actions processed
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result.outcome() {
            Outcome::Applied => self.applied += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Output from an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            success: true,
            code: Some(0),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            success: false,
            code: Some(code),
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

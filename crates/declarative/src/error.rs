//! Error types for plan construction and execution.

use thiserror::Error;

/// Errors raised while building or executing a plan.
///
/// Action implementations return `anyhow::Result`; these variants are
/// wrapped inside it so callers can downcast to a specific kind.
#[derive(Debug, Error)]
pub enum Error {
    /// A delegated tool exited non-zero
    #[error("external command failed: {command} ({status}){}", stderr_suffix(.stderr))]
    ExternalCommandFailure {
        /// Full command line that was run
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// Something the action relies on is absent from the host
    #[error("precondition unmet for {action}: {message}")]
    PreconditionUnmet {
        /// Identifier of the action or resource that cannot proceed
        action: String,
        /// What is missing
        message: String,
    },

    /// An action ran but the host does not report the expected state
    #[error("postcondition unmet after applying {action}")]
    PostconditionUnmet {
        /// Identifier of the action
        action: String,
    },

    /// An action appears before the action that provides what it requires
    #[error("plan order violated: {action} requires {key}, which {provider} provides later")]
    OrderViolation {
        /// Action that requires the key
        action: String,
        /// Dependency key
        key: String,
        /// Action that provides the key
        provider: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl Error {
    /// Build an external command failure from a command line and its output
    pub fn command_failed(cmd: &str, args: &[&str], output: &crate::CommandOutput) -> Self {
        let status = match output.code {
            Some(code) => format!("exit {code}"),
            None => "terminated by signal".to_string(),
        };
        Self::ExternalCommandFailure {
            command: command_line(cmd, args),
            status,
            stderr: output.stderr_str(),
        }
    }
}

/// Render a command and its arguments as one line
pub fn command_line(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

//! Error types for firewall file handling.

use thiserror::Error;

/// Errors that can occur while parsing firewall files.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid firewall file syntax
    #[error("invalid firewall file syntax at line {line}: {message}")]
    Parse {
        /// Line number where the parse error occurred (1-indexed)
        line: usize,
        /// Description of the syntax error
        message: String,
    },
}

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for firewall operations.
pub type Result<T> = std::result::Result<T, Error>;

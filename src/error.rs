//! Error types surfaced before any action runs.
//!
//! Execution-time failures (external commands, unmet preconditions and
//! postconditions, ordering) live in [`declarative::Error`].

use std::path::PathBuf;
use thiserror::Error;

/// The host description could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A field parsed but holds an unacceptable value
    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while turning a host description into a plan.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported RAID layout for pool '{pool}': {level} {reason}")]
    UnsupportedRaidLevel {
        pool: String,
        level: String,
        reason: String,
    },

    #[error(transparent)]
    Plan(#[from] declarative::Error),
}

//! Host description loading

use crate::error::ConfigError;
use crate::schema::HostSpec;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve a `--config` argument, expanding `~` and environment variables
pub fn resolve_path(raw: &Path) -> PathBuf {
    crate::paths::expand(&raw.to_string_lossy())
}

/// Read, parse and validate a host description
pub fn load(path: &Path) -> Result<HostSpec, ConfigError> {
    let path = resolve_path(path);
    log::debug!("Loading host description from {}", path.display());

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let spec = parse(&path, &content)?;

    log::info!(
        "Loaded {}: {} pools, {} templates, {} VM templates",
        path.display(),
        spec.pools.len(),
        spec.templates.len(),
        spec.vm_templates.len()
    );
    Ok(spec)
}

/// Parse and validate host description text
pub fn parse(path: &Path, content: &str) -> Result<HostSpec, ConfigError> {
    let spec: HostSpec = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    spec.validate()?;
    Ok(spec)
}

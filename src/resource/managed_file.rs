//! Files written whole from the host description

use anyhow::{Context, Result};
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};
use similar::TextDiff;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::render::{FileKind, RenderedFile};

/// A rendered file together with what is on disk right now
#[derive(Debug, Clone)]
pub struct ManagedFile {
    pub kind: FileKind,
    pub path: PathBuf,
    pub content: String,
    /// Content found when the plan was built
    pub previous: Option<String>,
}

impl ManagedFile {
    pub fn new(file: RenderedFile, previous: Option<String>) -> Self {
        Self {
            kind: file.kind,
            path: file.path,
            content: file.content,
            previous,
        }
    }

    /// Unified diff from the previous content to the desired content
    pub fn diff(&self) -> String {
        let old = self.previous.as_deref().unwrap_or("");
        let old_header = if self.previous.is_some() {
            self.path.display().to_string()
        } else {
            "/dev/null".to_string()
        };
        let new_header = self.path.display().to_string();

        TextDiff::from_lines(old, self.content.as_str())
            .unified_diff()
            .context_radius(2)
            .header(&old_header, &new_header)
            .to_string()
    }

    fn read_current(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }
}

impl Action for ManagedFile {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn description(&self) -> String {
        if self.previous.is_some() {
            format!("Update {}", self.path.display())
        } else {
            format!("Write {}", self.path.display())
        }
    }

    fn action_type(&self) -> &'static str {
        self.kind.action_type()
    }

    fn details(&self) -> Option<String> {
        Some(self.diff())
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(match self.read_current()? {
            None => ResourceState::Absent,
            Some(content) if content == self.content => ResourceState::Present { details: None },
            Some(content) => ResourceState::Modified {
                from: content,
                to: self.content.clone(),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.read_current()?.is_some();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }
        fs::write(&self.path, &self.content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        log::info!("Wrote {}", self.path.display());

        if let Some((cmd, args)) = self.kind.reload_command() {
            ctx.runner.run_checked(cmd, args)?;
        }

        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;

    fn file(path: PathBuf, kind: FileKind, content: &str) -> RenderedFile {
        RenderedFile {
            kind,
            path,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_apply_creates_parents_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc/pve/firewall/cluster.fw");
        let action = ManagedFile::new(file(path.clone(), FileKind::Firewall, "[OPTIONS]\n"), None);

        let runner = MockRunner::new();
        let mut ctx = ApplyContext::new(false, &runner);
        assert!(!action.is_satisfied(&ctx).unwrap());

        let result = action.apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Created));
        assert_eq!(fs::read_to_string(&path).unwrap(), "[OPTIONS]\n");
        assert!(action.verify(&ctx).unwrap());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_network_file_reloads_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmbr0");
        fs::write(&path, "old\n").unwrap();
        let action = ManagedFile::new(
            file(path.clone(), FileKind::Network, "new\n"),
            Some("old\n".to_string()),
        );

        let runner = MockRunner::new().ok("ifreload -a", "");
        let mut ctx = ApplyContext::new(false, &runner);
        let result = action.apply(&mut ctx).unwrap();

        assert!(matches!(result, ApplyResult::Modified));
        assert_eq!(runner.calls(), vec!["ifreload -a"]);
    }

    #[test]
    fn test_failed_reload_fails_action() {
        let dir = tempfile::tempdir().unwrap();
        let action = ManagedFile::new(
            file(dir.path().join("vmbr0"), FileKind::Network, "new\n"),
            None,
        );
        let runner = MockRunner::new().fail(
            "ifreload -a",
            1,
            "error: vmbr0: bridge port eno9 does not exist",
        );
        let mut ctx = ApplyContext::new(false, &runner);
        assert!(action.apply(&mut ctx).is_err());
    }

    #[test]
    fn test_diff_shows_changed_lines() {
        let action = ManagedFile::new(
            file(PathBuf::from("/etc/pve/firewall/cluster.fw"), FileKind::Firewall, "enable: 1\n"),
            Some("enable: 0\n".to_string()),
        );
        let diff = action.diff();
        assert!(diff.contains("-enable: 0"));
        assert!(diff.contains("+enable: 1"));
        assert_eq!(action.description(), "Update /etc/pve/firewall/cluster.fw");
    }

    #[test]
    fn test_satisfied_when_bytes_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pve-no-subscription.list");
        fs::write(&path, "deb x\n").unwrap();
        let action = ManagedFile::new(file(path, FileKind::AptSource, "deb x\n"), None);

        let runner = MockRunner::new();
        let ctx = ApplyContext::new(false, &runner);
        assert!(action.is_satisfied(&ctx).unwrap());
    }
}

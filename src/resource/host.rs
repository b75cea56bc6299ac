//! Hostname and timezone

use anyhow::Result;
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};

/// The system hostname, set through `hostnamectl`
#[derive(Debug, Clone)]
pub struct Hostname {
    pub name: String,
}

impl Hostname {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Action for Hostname {
    fn id(&self) -> String {
        "hostname".to_string()
    }

    fn description(&self) -> String {
        format!("Set hostname to {}", self.name)
    }

    fn action_type(&self) -> &'static str {
        "hostname"
    }

    fn details(&self) -> Option<String> {
        Some(format!("hostnamectl set-hostname {}", self.name))
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let current = ctx.runner.run_capture("hostname", &[])?;
        Ok(ResourceState::Present {
            details: Some(current.trim().to_string()),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.name.clone()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.runner
            .run_checked("hostnamectl", &["set-hostname", &self.name])?;
        Ok(ApplyResult::Modified)
    }
}

/// The system timezone, set through `timedatectl`
#[derive(Debug, Clone)]
pub struct Timezone {
    pub zone: String,
}

impl Timezone {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.to_string(),
        }
    }
}

impl Action for Timezone {
    fn id(&self) -> String {
        "timezone".to_string()
    }

    fn description(&self) -> String {
        format!("Set timezone to {}", self.zone)
    }

    fn action_type(&self) -> &'static str {
        "timezone"
    }

    fn details(&self) -> Option<String> {
        Some(format!("timedatectl set-timezone {}", self.zone))
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let current = ctx
            .runner
            .run_capture("timedatectl", &["show", "-p", "Timezone", "--value"])?;
        Ok(ResourceState::Present {
            details: Some(current.trim().to_string()),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.zone.clone()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.runner
            .run_checked("timedatectl", &["set-timezone", &self.zone])?;
        Ok(ApplyResult::Modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;

    #[test]
    fn test_hostname_satisfied_when_equal() {
        let runner = MockRunner::new().ok("hostname", "pve1\n");
        let ctx = ApplyContext::new(false, &runner);
        assert!(Hostname::new("pve1").is_satisfied(&ctx).unwrap());
        assert!(!Hostname::new("pve2").is_satisfied(&ctx).unwrap());
    }

    #[test]
    fn test_timezone_apply_runs_timedatectl() {
        let runner = MockRunner::new().ok("timedatectl set-timezone Europe/Berlin", "");
        let mut ctx = ApplyContext::new(false, &runner);
        let result = Timezone::new("Europe/Berlin").apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Modified));
        assert_eq!(runner.calls(), vec!["timedatectl set-timezone Europe/Berlin"]);
    }

    #[test]
    fn test_hostname_apply_failure_propagates() {
        let runner = MockRunner::new().fail("hostnamectl set-hostname pve1", 1, "access denied");
        let mut ctx = ApplyContext::new(false, &runner);
        let err = Hostname::new("pve1").apply(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }
}

//! Scheduled vzdump backup job

use anyhow::Result;
use declarative::error::command_line;
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};

use super::storage_key;
use crate::schema::{BackupPolicy, GuestSelection};

/// Cluster backup job created through `pvesh`
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub policy: BackupPolicy,
}

impl BackupJob {
    pub fn new(policy: &BackupPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Arguments to `pvesh`
    pub fn create_args(&self) -> Vec<String> {
        let p = &self.policy;
        let mut args: Vec<String> = [
            "create",
            "/cluster/backup",
            "--id",
            p.id.as_str(),
            "--schedule",
        ]
        .map(String::from)
        .into();
        args.push(p.calendar_event());
        args.extend(
            [
                "--storage",
                p.storage.as_str(),
                "--mode",
                p.mode.as_str(),
                "--compress",
                p.compression.as_str(),
                "--prune-backups",
            ]
            .map(String::from),
        );
        args.push(format!("keep-last={}", p.retention));

        match &p.vmids {
            GuestSelection::All => args.extend(["--all", "1"].map(String::from)),
            GuestSelection::List(ids) => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                args.push("--vmid".to_string());
                args.push(ids.join(","));
            }
        }
        if let Some(mail) = &p.mail_to {
            args.push("--mailto".to_string());
            args.push(mail.clone());
        }
        args
    }
}

impl Action for BackupJob {
    fn id(&self) -> String {
        self.policy.id.clone()
    }

    fn description(&self) -> String {
        format!(
            "Schedule backup job {} to {} at {}",
            self.policy.id,
            self.policy.storage,
            self.policy.calendar_event()
        )
    }

    fn action_type(&self) -> &'static str {
        "backup_job"
    }

    fn details(&self) -> Option<String> {
        let args = self.create_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(command_line("pvesh", &args))
    }

    fn requires(&self) -> Vec<String> {
        vec![storage_key(&self.policy.storage)]
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let json = ctx
            .runner
            .run_capture("pvesh", &["get", "/cluster/backup", "--output-format", "json"])?;
        Ok(if crate::probe::parse_backup_jobs(&json).contains(&self.policy.id) {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let args = self.create_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.runner.run_checked("pvesh", &args)?;
        Ok(ApplyResult::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;
    use crate::schema::HostSpec;
    use crate::testutil::FULL_SPEC;

    fn job() -> BackupJob {
        let spec: HostSpec = toml::from_str(FULL_SPEC).unwrap();
        BackupJob::new(spec.backup.as_ref().unwrap())
    }

    #[test]
    fn test_create_args() {
        assert_eq!(
            job().create_args(),
            vec![
                "create",
                "/cluster/backup",
                "--id",
                "nightly",
                "--schedule",
                "mon,wed,fri 02:30",
                "--storage",
                "backup",
                "--mode",
                "snapshot",
                "--compress",
                "zstd",
                "--prune-backups",
                "keep-last=5",
                "--all",
                "1",
                "--mailto",
                "ops@lab.example",
            ]
        );
    }

    #[test]
    fn test_guest_list_selection() {
        let mut job = job();
        job.policy.vmids = GuestSelection::List(vec![100, 101]);
        job.policy.mail_to = None;
        let args = job.create_args();
        assert_eq!(args[args.len() - 2..], ["--vmid", "100,101"]);
    }

    #[test]
    fn test_existing_job_is_satisfied() {
        let runner = MockRunner::new().ok(
            "pvesh get /cluster/backup --output-format json",
            r#"[{"id":"nightly","schedule":"02:30"}]"#,
        );
        let ctx = ApplyContext::new(false, &runner);
        assert!(job().is_satisfied(&ctx).unwrap());
        assert_eq!(job().requires(), vec!["storage:backup"]);
    }
}

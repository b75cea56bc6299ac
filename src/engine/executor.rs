//! Plan execution with terminal progress and confirmation

use anyhow::Result;
use declarative::{
    ApplyResult, CommandRunner, ConfirmCallback, ExecuteOptions, FailurePolicy, Plan,
    ProgressCallback, RunReport,
};
use dialoguer::Confirm;
use indicatif::ProgressBar;
use std::io::IsTerminal;

use crate::progress;
use crate::ui;

/// How a provisioning run should behave
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub policy: FailurePolicy,
    /// Pass the point of no return without asking
    pub yes: bool,
    pub verbose: bool,
}

/// Execute the plan, showing progress on the terminal
pub fn execute(plan: &Plan, opts: &RunOptions, runner: &dyn CommandRunner) -> Result<RunReport> {
    let bar = progress::bar(plan.len() as u64, "Applying");
    let mut progress = BarProgress { bar: bar.clone() };
    let mut confirm = TerminalConfirm {
        assume_yes: opts.yes,
        bar: Some(bar),
    };

    let exec_opts = ExecuteOptions {
        policy: opts.policy,
        verbose: opts.verbose,
    };
    declarative::execute(plan, &exec_opts, runner, &mut progress, &mut confirm)
}

struct BarProgress {
    bar: ProgressBar,
}

impl ProgressCallback for BarProgress {
    fn on_plan_start(&mut self, count: usize) {
        self.bar.set_length(count as u64);
    }

    fn on_action_start(&mut self, _id: &str, description: &str) {
        self.bar.set_message(description.to_string());
    }

    fn on_action_complete(&mut self, id: &str, result: &ApplyResult) {
        log::info!("{id}: {}", result.message());
        self.bar.inc(1);
    }

    fn on_plan_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Asks the point-of-no-return question on the terminal
///
/// With `assume_yes` the answer is always yes. Without a terminal the
/// answer is no, so unattended runs never block on a prompt.
pub struct TerminalConfirm {
    pub assume_yes: bool,
    /// Bar to hide while the prompt is shown
    pub bar: Option<ProgressBar>,
}

impl TerminalConfirm {
    fn ask(prompt: &str) -> Result<bool> {
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            log::info!("Confirmed by --yes: {prompt}");
            return Ok(true);
        }
        if !std::io::stdin().is_terminal() || !console::user_attended() {
            let msg = format!("{prompt} Not asking without a terminal; rerun with --yes");
            match &self.bar {
                Some(bar) => bar.suspend(|| ui::warn(&msg)),
                None => ui::warn(&msg),
            }
            return Ok(false);
        }
        match &self.bar {
            Some(bar) => bar.suspend(|| Self::ask(prompt)),
            None => Self::ask(prompt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{FileKind, RenderedFile};
    use crate::resource::{ManagedFile, PveStorage, ZfsPool};
    use crate::runner::mock::MockRunner;
    use crate::schema::{DiskPool, HostSpec};
    use crate::testutil::FULL_SPEC;
    use declarative::Outcome;

    fn vm_pool() -> DiskPool {
        let spec: HostSpec = toml::from_str(FULL_SPEC).unwrap();
        spec.pools[0].clone()
    }

    fn plan(file_path: std::path::PathBuf) -> Plan {
        let pool = vm_pool();
        let mut plan = Plan::new();
        plan.push(Box::new(ZfsPool::new(&pool)));
        plan.push(Box::new(PveStorage::new(&pool)));
        plan.push(Box::new(ManagedFile::new(
            RenderedFile {
                kind: FileKind::Firewall,
                path: file_path,
                content: "[OPTIONS]\n\nenable: 1\n".to_string(),
            },
            None,
        )));
        plan
    }

    #[test]
    fn test_yes_passes_point_of_no_return() {
        let mut confirm = TerminalConfirm {
            assume_yes: true,
            bar: None,
        };
        assert!(confirm.confirm("Create ZFS pool tank?").unwrap());
    }

    #[test]
    fn test_continue_skips_dependents_of_failed_pool() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("cluster.fw");
        let runner = MockRunner::new()
            .fail("zpool list -H -o name nvme-mirror", 1, "cannot open 'nvme-mirror': no such pool")
            .fail(
                "zpool create -f -o ashift=12 nvme-mirror mirror /dev/nvme0n1 /dev/nvme1n1",
                1,
                "/dev/nvme1n1 is in use",
            )
            .ok("pvesm status", "Name Type Status\nlocal dir active\n");

        let opts = RunOptions {
            policy: FailurePolicy::Continue,
            yes: true,
            verbose: false,
        };
        let report = execute(&plan(fw.clone()), &opts, &runner).unwrap();

        assert_eq!(report.records[0].outcome, Outcome::Failed);
        assert!(report.records[0].result.message().contains("/dev/nvme1n1 is in use"));
        assert_eq!(report.records[1].outcome, Outcome::Skipped);
        assert!(report.records[1].result.message().contains("pool:nvme-mirror"));
        assert_eq!(report.records[2].outcome, Outcome::Applied);
        assert!(fw.exists());
        assert!(!report.is_success());
    }

    #[test]
    fn test_fail_fast_halts_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("cluster.fw");
        let runner = MockRunner::new()
            .fail("zpool list -H -o name nvme-mirror", 1, "")
            .fail(
                "zpool create -f -o ashift=12 nvme-mirror mirror /dev/nvme0n1 /dev/nvme1n1",
                1,
                "no such device",
            );

        let opts = RunOptions {
            yes: true,
            ..RunOptions::default()
        };
        let report = execute(&plan(fw.clone()), &opts, &runner).unwrap();

        assert!(report.halted);
        assert_eq!(report.summary().failed, 1);
        assert_eq!(report.summary().skipped, 2);
        assert!(!fw.exists());
    }
}

//! Execution engine - applies a plan strictly in order
//!
//! Actions share host-global resources (block devices, the cluster
//! configuration directory), so they are never applied concurrently.
//! Nothing is rolled back and nothing is retried: once a destructive
//! action starts, the host is past the point of no return.

use crate::action::Action;
use crate::context::{ApplyContext, CommandRunner, ConfirmCallback, ProgressCallback};
use crate::error::Error;
use crate::planner::Plan;
use crate::types::{ActionRecord, ApplyResult, ExecuteOptions, FailurePolicy, RunReport};
use anyhow::Result;
use std::collections::HashSet;

const HALTED_REASON: &str = "halted after earlier failure";
const DECLINED_REASON: &str = "point of no return declined";
const SATISFIED_REASON: &str = "already satisfied";

/// Result of stepping through one action
enum Step {
    Done(ApplyResult),
    Declined,
}

/// Execute a plan with the given options and callbacks
///
/// # Type Parameters
/// * `P` - Progress callback type
/// * `C` - Confirm callback type
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (failure policy, verbose)
/// * `runner` - Runner used by actions for host commands
/// * `progress` - Progress callback
/// * `confirm` - Asked once, before the first destructive action
///
/// # Returns
/// One record per action, in plan order. Only an ordering violation is
/// returned as `Err`; action failures are recorded, never propagated.
pub fn execute<P, C>(
    plan: &Plan,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
    progress: &mut P,
    confirm: &mut C,
) -> Result<RunReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    plan.validate_order()?;

    let mut report = RunReport::default();
    let mut halted: Option<&'static str> = None;
    let mut failed_keys: HashSet<String> = HashSet::new();
    let mut passed_point_of_no_return = false;

    progress.on_plan_start(plan.len());

    for action in plan.iter() {
        let id = action.id();

        let result = if let Some(reason) = halted {
            ApplyResult::Skipped {
                reason: reason.to_string(),
            }
        } else if let Some(dependency) = action
            .requires()
            .into_iter()
            .find(|k| failed_keys.contains(k))
        {
            failed_keys.extend(action.provides());
            ApplyResult::Skipped {
                reason: format!("dependency {dependency} failed"),
            }
        } else {
            progress.on_action_start(&id, &action.description());
            let mut ctx = ApplyContext::new(opts.verbose, runner);

            match step(action, &mut ctx, confirm, &mut passed_point_of_no_return) {
                Step::Done(result) => {
                    if !result.is_success() {
                        failed_keys.extend(action.provides());
                        if opts.policy == FailurePolicy::FailFast {
                            halted = Some(HALTED_REASON);
                        }
                    }
                    result
                }
                Step::Declined => {
                    halted = Some(DECLINED_REASON);
                    ApplyResult::Skipped {
                        reason: DECLINED_REASON.to_string(),
                    }
                }
            }
        };

        progress.on_action_complete(&id, &result);
        report.records.push(ActionRecord::new(
            id,
            action.action_type(),
            action.description(),
            result,
        ));
    }

    report.halted = halted.is_some();
    progress.on_plan_complete();

    Ok(report)
}

/// Check, confirm, apply and verify a single action
fn step<C: ConfirmCallback>(
    action: &dyn Action,
    ctx: &mut ApplyContext,
    confirm: &mut C,
    passed_point_of_no_return: &mut bool,
) -> Step {
    match action.is_satisfied(ctx) {
        Ok(true) => {
            return Step::Done(ApplyResult::Skipped {
                reason: SATISFIED_REASON.to_string(),
            });
        }
        Ok(false) => {}
        Err(e) => {
            return Step::Done(ApplyResult::Failed {
                error: format!("precondition check failed: {e:#}"),
            });
        }
    }

    if action.is_destructive() && !*passed_point_of_no_return {
        let prompt = format!(
            "{} is destructive and cannot be undone. Continue?",
            action.description()
        );
        match confirm.confirm(&prompt) {
            Ok(true) => *passed_point_of_no_return = true,
            Ok(false) | Err(_) => return Step::Declined,
        }
    }

    let result = match action.apply(ctx) {
        Ok(result) => result,
        Err(e) => {
            return Step::Done(ApplyResult::Failed {
                error: format!("{e:#}"),
            });
        }
    };

    if !result.is_change() {
        return Step::Done(result);
    }

    match action.verify(ctx) {
        Ok(true) => Step::Done(result),
        Ok(false) => Step::Done(ApplyResult::Failed {
            error: Error::PostconditionUnmet { action: action.id() }.to_string(),
        }),
        Err(e) => Step::Done(ApplyResult::Failed {
            error: format!("postcondition check failed: {e:#}"),
        }),
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(
    plan: &Plan,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
) -> Result<RunReport> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, runner, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::types::{CommandOutput, Outcome, ResourceState};
    use std::sync::Mutex;

    /// Mock runner for tests
    #[derive(Default)]
    struct MockRunner {
        calls: Mutex<Vec<String>>,
    }

    impl CommandRunner for MockRunner {
        fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = crate::error::command_line(cmd, args);
            self.calls.lock().unwrap().push(line);
            if cmd == "false" {
                Ok(CommandOutput::failed(1, "simulated failure"))
            } else {
                Ok(CommandOutput::ok(""))
            }
        }
    }

    #[derive(Debug)]
    struct TestAction {
        id: &'static str,
        satisfied: bool,
        command: &'static str,
        destructive: bool,
        provides: Vec<String>,
        requires: Vec<String>,
    }

    impl TestAction {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                satisfied: false,
                command: "true",
                destructive: false,
                provides: vec![format!("key:{id}")],
                requires: Vec::new(),
            }
        }

        fn failing(mut self) -> Self {
            self.command = "false";
            self
        }

        fn satisfied(mut self) -> Self {
            self.satisfied = true;
            self
        }

        fn destructive(mut self) -> Self {
            self.destructive = true;
            self
        }

        fn requiring(mut self, id: &str) -> Self {
            self.requires.push(format!("key:{id}"));
            self
        }
    }

    impl Action for TestAction {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            format!("Test action {}", self.id)
        }

        fn action_type(&self) -> &'static str {
            "test"
        }

        fn provides(&self) -> Vec<String> {
            self.provides.clone()
        }

        fn requires(&self) -> Vec<String> {
            self.requires.clone()
        }

        fn is_destructive(&self) -> bool {
            self.destructive
        }

        fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
            if self.satisfied {
                Ok(ResourceState::Present { details: None })
            } else {
                Ok(ResourceState::Absent)
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
            ctx.runner.run_checked(self.command, &[self.id])?;
            Ok(ApplyResult::Created)
        }

        fn verify(&self, _ctx: &ApplyContext) -> Result<bool> {
            Ok(true)
        }
    }

    fn plan_of(actions: Vec<TestAction>) -> Plan {
        let mut plan = Plan::new();
        for action in actions {
            plan.push(Box::new(action));
        }
        plan
    }

    fn outcomes(report: &RunReport) -> Vec<Outcome> {
        report.records.iter().map(|r| r.outcome).collect()
    }

    #[test]
    fn test_execute_empty_plan() {
        let runner = MockRunner::default();
        let report = execute_simple(&Plan::new(), &ExecuteOptions::default(), &runner).unwrap();

        assert!(report.records.is_empty());
        assert!(report.is_success());
    }

    #[test]
    fn test_satisfied_action_is_skipped_without_running() {
        let runner = MockRunner::default();
        let plan = plan_of(vec![TestAction::new("a").satisfied()]);

        let report = execute_simple(&plan, &ExecuteOptions::default(), &runner).unwrap();

        assert_eq!(
            report.records[0].result,
            ApplyResult::Skipped {
                reason: "already satisfied".into()
            }
        );
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fail_fast_skips_later_actions() {
        let runner = MockRunner::default();
        let plan = plan_of(vec![
            TestAction::new("a"),
            TestAction::new("b").failing(),
            TestAction::new("c"),
            TestAction::new("d"),
        ]);

        let report = execute_simple(&plan, &ExecuteOptions::default(), &runner).unwrap();

        assert_eq!(
            outcomes(&report),
            vec![Outcome::Applied, Outcome::Failed, Outcome::Skipped, Outcome::Skipped]
        );
        assert!(report.halted);
        assert_eq!(
            report.records[2].result,
            ApplyResult::Skipped {
                reason: "halted after earlier failure".into()
            }
        );
        // c and d never reached the runner
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failure_captures_command_output() {
        let runner = MockRunner::default();
        let plan = plan_of(vec![TestAction::new("a").failing()]);

        let report = execute_simple(&plan, &ExecuteOptions::default(), &runner).unwrap();

        match &report.records[0].result {
            ApplyResult::Failed { error } => {
                assert!(error.contains("false a"));
                assert!(error.contains("simulated failure"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_continue_skips_only_dependents() {
        let runner = MockRunner::default();
        let plan = plan_of(vec![
            TestAction::new("pool").failing(),
            TestAction::new("storage").requiring("pool"),
            TestAction::new("backup").requiring("storage"),
            TestAction::new("hostname"),
        ]);
        let opts = ExecuteOptions {
            policy: FailurePolicy::Continue,
            ..Default::default()
        };

        let report = execute_simple(&plan, &opts, &runner).unwrap();

        assert_eq!(
            outcomes(&report),
            vec![Outcome::Failed, Outcome::Skipped, Outcome::Skipped, Outcome::Applied]
        );
        assert!(!report.halted);
        assert_eq!(
            report.records[2].result,
            ApplyResult::Skipped {
                reason: "dependency key:storage failed".into()
            }
        );
    }

    #[test]
    fn test_declined_point_of_no_return_halts() {
        let runner = MockRunner::default();
        let plan = plan_of(vec![
            TestAction::new("hostname"),
            TestAction::new("pool").destructive(),
            TestAction::new("storage"),
        ]);

        let report = execute(
            &plan,
            &ExecuteOptions::default(),
            &runner,
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert_eq!(
            outcomes(&report),
            vec![Outcome::Applied, Outcome::Skipped, Outcome::Skipped]
        );
        assert!(report.halted);
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_confirm_asked_once() {
        struct Counting(usize);
        impl ConfirmCallback for Counting {
            fn confirm(&mut self, _prompt: &str) -> Result<bool> {
                self.0 += 1;
                Ok(true)
            }
        }

        let runner = MockRunner::default();
        let plan = plan_of(vec![
            TestAction::new("a").destructive(),
            TestAction::new("b").destructive(),
        ]);
        let mut confirm = Counting(0);

        let report = execute(
            &plan,
            &ExecuteOptions::default(),
            &runner,
            &mut NoProgress,
            &mut confirm,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(confirm.0, 1);
    }

    #[test]
    fn test_order_violation_is_rejected_before_running() {
        let runner = MockRunner::default();
        let plan = plan_of(vec![
            TestAction::new("storage").requiring("pool"),
            TestAction::new("pool"),
        ]);

        let err = execute(
            &plan,
            &ExecuteOptions::default(),
            &runner,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap_err();

        assert!(err.downcast_ref::<Error>().is_some());
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}

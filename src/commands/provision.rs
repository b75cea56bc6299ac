use anyhow::{Result, bail};
use chrono::Utc;
use declarative::{CommandRunner, FailurePolicy, Plan, RunReport};

use crate::Context;
use crate::cli::ProvisionArgs;
use crate::engine::{self, RunOptions, differ};
use crate::paths;
use crate::privilege;
use crate::report::{self, RunRecord};
use crate::runner::SystemRunner;
use crate::ui;

pub fn run(ctx: &Context, args: ProvisionArgs) -> Result<()> {
    privilege::require_root("provision")?;
    let started_at = Utc::now();

    let prepared = super::prepare(ctx, &args.config.config, args.target.as_deref(), &SystemRunner)?;
    let plan = &prepared.plan;

    ui::header(&format!("Provisioning {}", prepared.spec.host.hostname));
    differ::display_plan(plan, ctx.verbose > 0);

    let policy = if args.continue_on_error {
        FailurePolicy::Continue
    } else {
        prepared.spec.execution.policy
    };
    let opts = RunOptions {
        policy,
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };
    let run = apply(plan, &opts, &SystemRunner)?;

    let record = RunRecord::new(
        &run,
        started_at,
        &args.config.config,
        &prepared.spec.host.hostname,
        policy,
    );
    let log_path = paths::run_log();
    if let Err(e) = record.append_to(&log_path) {
        ui::warn(&format!("Could not record this run: {e:#}"));
    }

    if !run.is_success() {
        let summary = run.summary();
        bail!(
            "provisioning incomplete: {} failed, {} skipped (see {})",
            summary.failed,
            summary.skipped,
            log_path.display()
        );
    }
    Ok(())
}

/// Apply the plan. A converged host yields an empty run, which is still
/// recorded.
fn apply(plan: &Plan, opts: &RunOptions, runner: &dyn CommandRunner) -> Result<RunReport> {
    if plan.is_empty() {
        return Ok(RunReport::default());
    }
    let run = engine::execute(plan, opts, runner)?;
    report::print_report(&run);
    Ok(run)
}

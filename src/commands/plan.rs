use anyhow::Result;

use crate::Context;
use crate::cli::PlanArgs;
use crate::engine::differ;
use crate::runner::SystemRunner;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let prepared = super::prepare(ctx, &args.config.config, args.target.as_deref(), &SystemRunner)?;

    ui::header(&format!("Plan for {}", prepared.spec.host.hostname));
    differ::display_plan(&prepared.plan, true);

    if !prepared.plan.is_empty() && !ctx.quiet {
        println!();
        ui::info("Dry run - nothing was changed. Run `pvesetup provision` to apply.");
    }
    Ok(())
}

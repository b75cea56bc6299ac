use anyhow::Result;
use declarative::FailurePolicy;

use crate::Context;
use crate::cli::ConfigArgs;
use crate::config;
use crate::engine::planner;
use crate::ui;

pub fn run(ctx: &Context, args: ConfigArgs) -> Result<()> {
    let spec = config::load(&args.config)?;
    planner::check_raid_layouts(&spec)?;

    if ctx.quiet {
        return Ok(());
    }
    ui::success(&format!("{} is valid", args.config.display()));
    ui::kv("host", &spec.host.hostname);
    ui::kv("pools", &spec.pools.len().to_string());
    ui::kv("templates", &spec.templates.len().to_string());
    ui::kv("vm templates", &spec.vm_templates.len().to_string());
    ui::kv("backup", if spec.backup.is_some() { "yes" } else { "no" });
    ui::kv("firewall", if spec.firewall.is_some() { "yes" } else { "no" });
    let policy = match spec.execution.policy {
        FailurePolicy::FailFast => "halt",
        FailurePolicy::Continue => "continue with independent actions",
    };
    ui::kv("on failure", policy);
    Ok(())
}

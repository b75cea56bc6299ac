pub mod plan;
pub mod probe;
pub mod provision;
pub mod validate;

use anyhow::Result;
use declarative::{CommandRunner, Plan};
use std::path::Path;

use crate::Context;
use crate::config;
use crate::engine;
use crate::probe as host_probe;
use crate::progress;
use crate::schema::HostSpec;

/// Everything `plan` and `provision` work from
pub struct Prepared {
    pub spec: HostSpec,
    pub plan: Plan,
}

/// Load the host description, probe the host and build the plan
pub fn prepare(
    ctx: &Context,
    config_path: &Path,
    target: Option<&str>,
    runner: &dyn CommandRunner,
) -> Result<Prepared> {
    let spec = config::load(config_path)?;

    let spinner = progress::spinner("Probing host...");
    let probed = host_probe::probe(&spec, &ctx.layout, runner);
    spinner.finish_and_clear();

    let plan = engine::build_plan(&spec, &probed, &ctx.layout)?.filter_by_target(target);
    Ok(Prepared { spec, plan })
}

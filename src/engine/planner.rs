//! Plan building
//!
//! Turns a validated [`HostSpec`] and a [`ProbedState`] into an ordered
//! [`Plan`] holding only the changes the host still needs.

use declarative::{Error, Plan};

use crate::error::ProvisionError;
use crate::layout::PveLayout;
use crate::probe::ProbedState;
use crate::render;
use crate::resource::{
    BackupJob, ContainerTemplate, Hostname, IsoImage, ManagedFile, PveStorage, TemplateIndex,
    Timezone, VmTemplate, ZfsPool,
};
use crate::schema::{HostSpec, TemplateKind};

/// Build the plan of actions that converges the host onto `spec`
///
/// Every pool layout is checked before anything is planned, so an
/// unsupported layout yields no plan at all.
pub fn build_plan(
    spec: &HostSpec,
    probed: &ProbedState,
    layout: &PveLayout,
) -> Result<Plan, ProvisionError> {
    check_raid_layouts(spec)?;

    let mut plan = Plan::new();

    if probed.hostname.as_deref() != Some(spec.host.hostname.as_str()) {
        plan.push(Box::new(Hostname::new(&spec.host.hostname)));
    }
    if probed.timezone.as_deref() != Some(spec.host.timezone.as_str()) {
        plan.push(Box::new(Timezone::new(&spec.host.timezone)));
    }

    for file in render::managed_files(spec, layout, probed.codename.as_deref())? {
        let previous = probed.files.get(&file.path);
        if previous != Some(&file.content) {
            let previous = previous.cloned();
            plan.push(Box::new(ManagedFile::new(file, previous)));
        }
    }

    for pool in spec.pools.iter().filter(|p| !probed.has_pool(&p.name)) {
        plan.push(Box::new(ZfsPool::new(pool)));
    }
    for pool in spec
        .pools
        .iter()
        .filter(|p| !probed.has_storage(p.storage_id()))
    {
        plan.push(Box::new(PveStorage::new(pool)));
    }

    if let Some(backup) = &spec.backup
        && !probed.backup_jobs.contains(&backup.id)
    {
        require_storage(spec, probed, &backup.id, &backup.storage, "backup")?;
        plan.push(Box::new(BackupJob::new(backup)));
    }

    plan_templates(spec, probed, &mut plan)?;
    plan_vm_templates(spec, probed, &mut plan)?;

    plan.validate_order()?;
    log::debug!("Planned {} actions", plan.len());
    Ok(plan)
}

/// Device counts for every pool's RAID layout
pub fn check_raid_layouts(spec: &HostSpec) -> Result<(), ProvisionError> {
    for pool in &spec.pools {
        pool.raid
            .check_device_count(pool.devices.len())
            .map_err(|reason| ProvisionError::UnsupportedRaidLevel {
                pool: pool.name.clone(),
                level: pool.raid.to_string(),
                reason,
            })?;
    }
    Ok(())
}

/// Check that a storage can hold `content` before anything is applied
///
/// A storage declared by a pool must be registered with that content
/// type. A storage only found on the host is taken as it is.
fn require_storage(
    spec: &HostSpec,
    probed: &ProbedState,
    action: &str,
    storage: &str,
    content: &str,
) -> Result<(), Error> {
    let unmet = |message: String| Error::PreconditionUnmet {
        action: action.to_string(),
        message,
    };

    match spec.pools.iter().find(|p| p.storage_id() == storage) {
        Some(pool) if !pool.purpose.content().contains(&content) => Err(unmet(format!(
            "storage '{storage}' is a {} pool and cannot hold {content}",
            pool.purpose.as_str()
        ))),
        Some(_) => Ok(()),
        None if probed.has_storage(storage) => Ok(()),
        None => Err(unmet(format!(
            "storage '{storage}' does not exist and no pool declares it"
        ))),
    }
}

fn plan_templates(spec: &HostSpec, probed: &ProbedState, plan: &mut Plan) -> Result<(), Error> {
    let missing: Vec<_> = spec
        .templates
        .iter()
        .filter(|t| !probed.has_volume(&t.volid()))
        .collect();

    for template in &missing {
        let content = match template.kind {
            TemplateKind::Container => "vztmpl",
            TemplateKind::Iso => "iso",
        };
        require_storage(spec, probed, &template.volid(), &template.storage, content)?;
    }

    if missing.iter().any(|t| t.kind == TemplateKind::Container) {
        plan.push(Box::new(TemplateIndex));
    }
    for template in missing {
        match template.kind {
            TemplateKind::Container => plan.push(Box::new(ContainerTemplate::new(template))),
            TemplateKind::Iso => plan.push(Box::new(IsoImage::new(template))),
        }
    }
    Ok(())
}

fn plan_vm_templates(spec: &HostSpec, probed: &ProbedState, plan: &mut Plan) -> Result<(), Error> {
    for vm in &spec.vm_templates {
        let action = vm.vmid.to_string();
        if probed.guests.contains(&vm.vmid) {
            match probed.vms.get(&vm.vmid) {
                Some(config) if config.template => {}
                Some(config) if config.name.as_deref() == Some(vm.name.as_str()) => {
                    plan.push(Box::new(VmTemplate::convert(vm)));
                }
                _ => {
                    return Err(Error::PreconditionUnmet {
                        action,
                        message: format!("VMID {} is held by another guest", vm.vmid),
                    });
                }
            }
            continue;
        }
        let iso = resolve_iso(spec, probed, &vm.iso).ok_or_else(|| Error::PreconditionUnmet {
            action: action.clone(),
            message: format!("ISO '{}' is neither declared nor present", vm.iso),
        })?;
        require_storage(spec, probed, &action, &vm.disk_storage, "images")?;
        plan.push(Box::new(VmTemplate::new(vm, iso)));
    }
    Ok(())
}

/// Volume ID for a VM template's ISO reference
///
/// The reference is either the `os_id` of a declared ISO or a volume ID.
fn resolve_iso(spec: &HostSpec, probed: &ProbedState, reference: &str) -> Option<String> {
    if let Some(template) = spec
        .templates
        .iter()
        .find(|t| t.os_id == reference && t.kind == TemplateKind::Iso)
    {
        return Some(template.volid());
    }
    let declared = spec.templates.iter().any(|t| t.volid() == reference);
    (reference.contains(':') && (declared || probed.has_volume(reference)))
        .then(|| reference.to_string())
}

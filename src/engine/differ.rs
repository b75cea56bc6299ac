//! Plan display

use colored::{ColoredString, Colorize};
use declarative::{Action, Plan};

/// Heading for a group of actions
pub fn type_label(action_type: &str) -> &str {
    match action_type {
        "hostname" => "Hostname",
        "timezone" => "Timezone",
        "apt_source" => "Package repositories",
        "network" => "Network",
        "firewall_file" => "Firewall",
        "zfs_pool" => "ZFS pools",
        "pve_storage" => "Storage",
        "backup_job" => "Backup jobs",
        "template_index" | "container_template" | "iso_image" => "Templates",
        "vm_template" => "VM templates",
        _ => action_type,
    }
}

/// Actions grouped under their heading, in plan order of first appearance
pub fn grouped(plan: &Plan) -> Vec<(&'static str, Vec<&dyn Action>)> {
    let mut groups: Vec<(&'static str, Vec<&dyn Action>)> = Vec::new();
    for action in plan.iter() {
        let label = type_label(action.action_type());
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, actions)) => actions.push(action),
            None => groups.push((label, vec![action])),
        }
    }
    groups
}

fn diff_line(line: &str) -> ColoredString {
    if line.starts_with("+++") || line.starts_with("---") {
        line.bold()
    } else if line.starts_with('+') {
        line.green()
    } else if line.starts_with('-') {
        line.red()
    } else if line.starts_with("@@") {
        line.cyan()
    } else {
        line.dimmed()
    }
}

/// Print the plan as a boxed list of changes
pub fn display_plan(plan: &Plan, show_details: bool) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Provisioning Plan".bold()
    );
    println!("│");

    for (label, actions) in grouped(plan) {
        println!("│ {}", label.bold());
        for action in actions {
            let marker = if action.is_destructive() {
                " [destroys data]".red().to_string()
            } else {
                String::new()
            };
            println!("│   {} {}{}", "+".green(), action.description(), marker);

            if show_details && let Some(details) = action.details() {
                for line in details.lines() {
                    println!("│       {}", diff_line(line));
                }
            }
        }
        println!("│");
    }

    let destructive = plan.destructive_count();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} destructive)",
        plan.len().to_string().bold(),
        if destructive > 0 {
            destructive.to_string().red()
        } else {
            destructive.to_string().green()
        }
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ContainerTemplate, Hostname, IsoImage, TemplateIndex};
    use crate::testutil::full_spec;

    #[test]
    fn test_templates_share_a_group() {
        let spec = full_spec();
        let mut plan = Plan::new();
        plan.push(Box::new(Hostname::new("pve1")));
        plan.push(Box::new(TemplateIndex));
        plan.push(Box::new(ContainerTemplate::new(&spec.templates[0])));
        plan.push(Box::new(IsoImage::new(&spec.templates[1])));

        let groups = grouped(&plan);
        let summary: Vec<(&str, usize)> = groups.iter().map(|(l, a)| (*l, a.len())).collect();
        assert_eq!(summary, vec![("Hostname", 1), ("Templates", 3)]);
    }

    #[test]
    fn test_unknown_type_is_its_own_label() {
        assert_eq!(type_label("zfs_pool"), "ZFS pools");
        assert_eq!(type_label("custom"), "custom");
    }
}

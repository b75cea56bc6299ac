use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::Context;
use crate::cli::ConfigArgs;
use crate::config;
use crate::probe;
use crate::runner::{self, SystemRunner};
use crate::ui;

const TOOLS: &[&str] = &[
    "zpool",
    "zfs",
    "pvesm",
    "pvesh",
    "pveam",
    "qm",
    "hostnamectl",
    "timedatectl",
    "ifreload",
];

pub fn run(ctx: &Context, args: ConfigArgs) -> Result<()> {
    let spec = config::load(&args.config)?;
    let state = probe::probe(&spec, &ctx.layout, &SystemRunner);

    ui::header("Host");
    ui::kv("hostname", state.hostname.as_deref().unwrap_or("unknown"));
    ui::kv("timezone", state.timezone.as_deref().unwrap_or("unknown"));
    ui::kv("debian", state.codename.as_deref().unwrap_or("unknown"));
    if ctx.layout.root() != Path::new("/") {
        ui::kv("root", &ctx.layout.root().display().to_string());
    }

    ui::section("Tools");
    for tool in TOOLS {
        if runner::command_exists(tool) {
            println!("  {} {}", "✓".green(), tool);
        } else {
            println!("  {} {} {}", "✗".red(), tool, "(not found)".dimmed());
        }
    }

    list("Pools", state.pools.iter());
    list("Storages", state.storages.iter());
    list("Backup jobs", state.backup_jobs.iter());
    list("Guests", state.guests.iter());
    list("Volumes", state.volumes.iter());

    ui::section("Managed files");
    let files = state
        .files
        .iter()
        .map(|(path, content)| describe_file(path, content));
    print_items(files);
    Ok(())
}

/// Firewall files are parsed so unreadable syntax shows up before a run
fn describe_file(path: &Path, content: &str) -> String {
    if path.extension().is_none_or(|ext| ext != "fw") {
        return path.display().to_string();
    }
    match pvefw::parse_string(content) {
        Ok(file) => format!("{} ({} rules)", path.display(), file.rules.len()),
        Err(e) => format!("{} {}", path.display(), format!("(unreadable: {e})").red()),
    }
}

fn list<T: std::fmt::Display>(title: &str, items: impl Iterator<Item = T>) {
    ui::section(title);
    print_items(items);
}

fn print_items<T: std::fmt::Display>(items: impl Iterator<Item = T>) {
    let mut empty = true;
    for item in items {
        empty = false;
        println!("  • {item}");
    }
    if empty {
        ui::dim("(none)");
    }
}

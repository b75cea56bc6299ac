use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::paths::ENV_CONFIG;

#[derive(Parser)]
#[command(name = "pvesetup")]
#[command(version)]
#[command(about = "Declarative provisioning for Proxmox VE hosts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Treat this directory as the host's filesystem root
    #[arg(long, global = true, hide = true, default_value = "/")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what provisioning would change, without changing anything
    Plan(PlanArgs),

    /// Converge the host onto its description
    Provision(ProvisionArgs),

    /// Check a host description without touching the host
    Validate(ConfigArgs),

    /// Show what the host currently has
    Probe(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Host description (TOML)
    #[arg(short, long, env = ENV_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only plan matching actions, e.g. "pools", "storage.vm-storage"
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only apply matching actions, e.g. "firewall", "templates"
    #[arg(short, long)]
    pub target: Option<String>,

    /// Pass the point of no return without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Keep applying independent actions after a failure
    #[arg(long)]
    pub continue_on_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_provision_flags() {
        let cli = Cli::try_parse_from([
            "pvesetup",
            "-vv",
            "provision",
            "--config",
            "pve1.toml",
            "--yes",
            "--continue-on-error",
            "--target",
            "pools",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Provision(args) => {
                assert!(args.yes);
                assert!(args.continue_on_error);
                assert_eq!(args.target.as_deref(), Some("pools"));
                assert_eq!(args.config.config, PathBuf::from("pve1.toml"));
            }
            _ => panic!("expected provision"),
        }
    }

    #[test]
    fn test_plan_defaults_root() {
        let cli = Cli::try_parse_from(["pvesetup", "plan", "-c", "pve1.toml"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/"));
        assert!(matches!(cli.command, Command::Plan(_)));
    }
}

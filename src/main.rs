mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod firewall;
mod layout;
mod paths;
mod privilege;
mod probe;
mod progress;
mod render;
mod report;
mod resource;
mod runner;
mod schema;
#[cfg(test)]
mod testutil;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use layout::PveLayout;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Where host files are read and written
    pub layout: PveLayout,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        layout: PveLayout::new(&cli.root),
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Provision(args) => commands::provision::run(&ctx, args),
        Command::Validate(args) => commands::validate::run(&ctx, args),
        Command::Probe(args) => commands::probe::run(&ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pvesetup", &mut io::stdout());
            Ok(())
        }
    }
}

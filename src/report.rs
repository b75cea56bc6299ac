//! Run summaries
//!
//! Every provisioning run is printed as per-action lines with totals and
//! appended as one JSON object per line to the run log.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use declarative::{ExecuteSummary, FailurePolicy, Outcome, RunReport};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One entry in `runs.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: PathBuf,
    pub hostname: String,
    pub policy: FailurePolicy,
    pub halted: bool,
    pub summary: ExecuteSummary,
    pub actions: Vec<ActionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
    pub outcome: Outcome,
    pub message: String,
}

impl RunRecord {
    pub fn new(
        report: &RunReport,
        started_at: DateTime<Utc>,
        config: &Path,
        hostname: &str,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            config: config.to_path_buf(),
            hostname: hostname.to_string(),
            policy,
            halted: report.halted,
            summary: report.summary(),
            actions: report
                .records
                .iter()
                .map(|r| ActionEntry {
                    id: r.id.clone(),
                    action_type: r.action_type.clone(),
                    description: r.description.clone(),
                    outcome: r.outcome,
                    message: r.result.message(),
                })
                .collect(),
        }
    }

    /// Append this record as one JSON line
    pub fn append_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let line = serde_json::to_string(self).context("Failed to serialize run record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open run log: {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to write run log: {}", path.display()))?;
        log::debug!("Appended run record to {}", path.display());
        Ok(())
    }
}

/// Print per-action outcomes and totals
pub fn print_report(report: &RunReport) {
    println!();
    for record in &report.records {
        let symbol = match record.outcome {
            Outcome::Applied => "✓".green(),
            Outcome::Skipped => "⊘".dimmed(),
            Outcome::Failed => "✗".red(),
        };
        let message = record.result.message();
        match record.outcome {
            Outcome::Failed => {
                println!("  {} {}: {}", symbol, record.description, message.red());
            }
            _ => println!(
                "  {} {} {}",
                symbol,
                record.description,
                format!("({message})").dimmed()
            ),
        }
    }

    let summary = report.summary();
    println!();
    if report.is_success() {
        println!("  {} Host provisioned successfully!", "✓".green().bold());
    } else if report.halted {
        println!("  {} Provisioning halted", "✗".red().bold());
    } else {
        println!("  {} Provisioning finished with errors", "⚠".yellow().bold());
    }
    if summary.applied > 0 {
        println!("    • {} actions applied", summary.applied);
    }
    if summary.skipped > 0 {
        println!("    • {} actions skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "actions".red());
    }
}

//! `roster once`: bootstrap and one cycle, then print the report.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use roster_core::Config;
use roster_daemon::{init_tracing, Cycle, LiveCycle};
use roster_sync::CycleReport;

#[derive(Args, Debug)]
pub struct OnceArgs {
    /// Compute and log every change without writing to the directory.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl OnceArgs {
    pub fn run(self, config: Config) -> Result<()> {
        init_tracing();
        let cycle = LiveCycle::new(config);
        if !self.dry_run {
            cycle
                .bootstrap()
                .context("could not prepare the managed subtree")?;
        }
        let report = cycle.run(self.dry_run).context("sync cycle failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &CycleReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let status = if report.apply.errors == 0 && report.resolve.failed == 0 {
        "✓".green()
    } else {
        "!".yellow()
    };
    println!(
        "{prefix}{status} {} added, {} updated, {} deleted, {} errors",
        report.apply.added, report.apply.updated, report.apply.deleted, report.apply.errors
    );
    println!(
        "  policies {}  candidates {}  resolved {}  inactive {}  excluded {}  failed {}",
        report.extract.policies,
        report.candidates,
        report.resolve.resolved,
        report.resolve.skipped_inactive,
        report.resolve.skipped_excluded,
        report.resolve.failed
    );
    if let Some(snapshot) = &report.snapshot {
        println!("  snapshot {}", snapshot.display());
    }
    println!("  took {:.1}s", report.duration().as_secs_f64());
}

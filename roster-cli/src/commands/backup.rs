//! `roster backup`: on-demand LDIF snapshot.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use roster_core::Config;
use roster_daemon::{init_tracing, LiveCycle};
use roster_sync::{backup_now, SnapshotResult};

#[derive(Args, Debug)]
pub struct BackupArgs {}

impl BackupArgs {
    pub fn run(self, config: Config) -> Result<()> {
        init_tracing();
        let cycle = LiveCycle::new(config);
        match backup_now(&cycle.context()).context("snapshot failed")? {
            SnapshotResult::Written { path, entries } => {
                println!("{} wrote {entries} entries to {}", "✓".green(), path.display());
            }
            SnapshotResult::Unchanged { path } => {
                println!("· directory unchanged since {}", path.display());
            }
        }
        Ok(())
    }
}

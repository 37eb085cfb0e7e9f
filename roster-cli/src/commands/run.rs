//! `roster run`: the long-running daemon.

use anyhow::{Context, Result};
use clap::Args;

use roster_core::Config;
use roster_daemon::{start_blocking, SchedulerOptions};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after this many cycles instead of running until signalled.
    #[arg(long, hide = true)]
    pub max_cycles: Option<u64>,
}

impl RunArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let mut options = SchedulerOptions::from_config(&config);
        options.max_cycles = self.max_cycles;
        start_blocking(config, options).context("daemon exited with error")?;
        Ok(())
    }
}
